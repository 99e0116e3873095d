//! Process-wide prometheus registry, handed out to the web server and to
//! whichever actor wants a gauge.

use async_trait::async_trait;
use hannibal::{Actor, Context, Handler, Service};
use prometheus::{IntGauge, Opts, Registry};
use tracing::{error, trace};

pub mod command {
    use prometheus::{IntGauge, Registry};

    #[hannibal::message(result = "Registry")]
    pub struct GetRegistry;

    #[hannibal::message(result = "Option<IntGauge>")]
    pub struct AddGauge {
        pub name: String,
        pub help: String,
    }
}

#[derive(Debug, Default)]
pub struct MetricsService {
    registry: Registry,
}

impl MetricsService {
    pub async fn get_registry() -> hannibal::Result<Registry> {
        let registry = Self::from_registry().await?.call(command::GetRegistry).await?;
        Ok(registry)
    }

    pub async fn get_gauge(name: &str, help: &str) -> hannibal::Result<Option<IntGauge>> {
        let gauge = Self::from_registry()
            .await?
            .call(command::AddGauge {
                name: name.into(),
                help: help.into(),
            })
            .await?;
        Ok(gauge)
    }

    fn add_gauge(&self, name: &str, help: &str) -> Option<IntGauge> {
        trace!("creating new gauge {:?}", name);
        let gauge = match IntGauge::with_opts(Opts::new(name, help)) {
            Ok(gauge) => gauge,
            Err(err) => {
                error!("cannot instantiate gauge {:?} {}", (name, help), err);
                return None;
            }
        };

        if let Err(error) = self.registry.register(Box::new(gauge.clone())) {
            error!("cannot register gauge {}", error);
        }

        Some(gauge)
    }
}

#[async_trait]
impl Actor for MetricsService {
    const NAME: &'static str = module_path!();

    async fn started(&mut self, _ctx: &mut hannibal::Context<Self>) -> hannibal::Result<()> {
        trace!("starting MetricsService");
        Ok(())
    }

    async fn stopped(&mut self, _ctx: &mut hannibal::Context<Self>) {
        trace!("shutting down MetricsService");
    }
}

impl Service for MetricsService {}

#[async_trait]
impl Handler<command::GetRegistry> for MetricsService {
    async fn handle(&mut self, _ctx: &mut Context<Self>, _cmd: command::GetRegistry) -> Registry {
        trace!("passing out registry");
        self.registry.clone()
    }
}

#[async_trait]
impl Handler<command::AddGauge> for MetricsService {
    async fn handle(&mut self, _ctx: &mut Context<Self>, cmd: command::AddGauge) -> Option<IntGauge> {
        self.add_gauge(&cmd.name, &cmd.help)
    }
}
