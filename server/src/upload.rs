//! # Recording uploads
//!
//! The peripheral collaborator next to the relay: stores finished recordings
//! on disk and tells the room's members that a new file exists. Room and
//! password are checked against the same registry the websocket joins use.

use std::convert::Infallible;
use std::path::PathBuf;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use hannibal::Service;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::{Buf, Reply};

use huddle_protocol::RoomId;

use crate::relay::{command, SignalingRelay};

/// Multipart field carrying the recording.
const VIDEO_FIELD: &str = "video";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub room: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    pub room: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadReceipt {
    ok: bool,
    filename: String,
}

/// `{room}_{unix-millis}_{originalName}`, with any client-supplied path
/// components stripped from the original name.
pub fn storage_name(room: &RoomId, timestamp_millis: i64, original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("recording");
    format!("{}_{}_{}", room, timestamp_millis, base)
}

/// Names belonging to the room, newest first thanks to the timestamp in the
/// storage name.
fn matching_recordings(names: impl IntoIterator<Item = String>, room: &str) -> Vec<String> {
    let prefix = format!("{}_", room);
    let mut names = names
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .collect::<Vec<_>>();
    names.sort();
    names.reverse();
    names
}

fn text_reply(message: &'static str, status: StatusCode) -> warp::reply::Response {
    warp::reply::with_status(message, status).into_response()
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut collected, mut chunk| async move {
            while chunk.has_remaining() {
                let slice = chunk.chunk();
                collected.extend_from_slice(slice);
                let advance = slice.len();
                chunk.advance(advance);
            }
            Ok(collected)
        })
        .await
}

pub async fn handle_upload(
    query: UploadQuery,
    form: FormData,
    upload_dir: PathBuf,
) -> Result<warp::reply::Response, Infallible> {
    let (room, password) = match (query.room, query.password) {
        (Some(room), Some(password)) if !room.is_empty() && !password.is_empty() => {
            (RoomId::from(room), password)
        }
        _ => return Ok(text_reply("room & password required", StatusCode::BAD_REQUEST)),
    };

    let relay = match SignalingRelay::from_registry().await {
        Ok(relay) => relay,
        Err(error) => {
            warn!("relay unreachable {}", error);
            return Ok(text_reply("relay unavailable", StatusCode::INTERNAL_SERVER_ERROR));
        }
    };

    match relay
        .call(command::Authenticate {
            room: room.clone(),
            secret: password,
        })
        .await
    {
        Ok(true) => {}
        Ok(false) => return Ok(text_reply("Invalid room or password", StatusCode::FORBIDDEN)),
        Err(error) => {
            warn!("authentication call failed {}", error);
            return Ok(text_reply("relay unavailable", StatusCode::INTERNAL_SERVER_ERROR));
        }
    }

    let parts = match form.try_collect::<Vec<Part>>().await {
        Ok(parts) => parts,
        Err(error) => {
            warn!("unreadable multipart body {}", error);
            return Ok(text_reply("invalid multipart body", StatusCode::BAD_REQUEST));
        }
    };

    let part = match parts.into_iter().find(|part| part.name() == VIDEO_FIELD) {
        Some(part) => part,
        None => return Ok(text_reply("video field required", StatusCode::BAD_REQUEST)),
    };

    let original = part.filename().unwrap_or("recording.webm").to_owned();
    let filename = storage_name(&room, Utc::now().timestamp_millis(), &original);

    let bytes = match read_part(part).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!("failed to read upload {}", error);
            return Ok(text_reply("invalid multipart body", StatusCode::BAD_REQUEST));
        }
    };

    if let Err(error) = async_std::fs::write(upload_dir.join(&filename), &bytes).await {
        warn!("failed to store {} {}", filename, error);
        return Ok(text_reply("failed to store file", StatusCode::INTERNAL_SERVER_ERROR));
    }
    info!("file saved: {}", filename);

    // the file is already on disk, the announcement is best effort
    if let Err(error) = relay.send(command::FileAvailable {
        room,
        filename: filename.clone(),
    }) {
        warn!("failed to announce {} {}", filename, error);
    }

    Ok(warp::reply::json(&UploadReceipt { ok: true, filename }).into_response())
}

pub async fn handle_list_files(
    query: FilesQuery,
    upload_dir: PathBuf,
) -> Result<warp::reply::Response, Infallible> {
    let room = match query.room {
        Some(room) if !room.is_empty() => room,
        _ => return Ok(text_reply("room required", StatusCode::BAD_REQUEST)),
    };

    let mut entries = match async_std::fs::read_dir(&upload_dir).await {
        Ok(entries) => entries,
        Err(error) => {
            warn!("cannot read upload dir {} {}", upload_dir.display(), error);
            return Ok(text_reply("failed to list files", StatusCode::INTERNAL_SERVER_ERROR));
        }
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next().await {
        match entry {
            Ok(entry) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Err(error) => warn!("unreadable directory entry {}", error),
        }
    }

    Ok(warp::reply::json(&matching_recordings(names, &room)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_names_are_room_prefixed() {
        let name = storage_name(&RoomId::from("r1"), 1700000000000, "clip.webm");
        assert_eq!(name, "r1_1700000000000_clip.webm");
    }

    #[test]
    fn client_supplied_paths_are_stripped() {
        let name = storage_name(&RoomId::from("r1"), 7, "../../etc/passwd");
        assert_eq!(name, "r1_7_passwd");

        let windows = storage_name(&RoomId::from("r1"), 7, r"C:\clips\take1.webm");
        assert_eq!(windows, "r1_7_take1.webm");
    }

    #[test]
    fn pathological_names_fall_back_to_a_default() {
        let name = storage_name(&RoomId::from("r1"), 7, "dir/");
        assert_eq!(name, "r1_7_recording");
    }

    #[test]
    fn listing_only_matches_the_exact_room_prefix() {
        let names = vec![
            "r1_100_a.webm".to_owned(),
            "r10_100_b.webm".to_owned(),
            "other_100_c.webm".to_owned(),
        ];
        assert_eq!(matching_recordings(names, "r1"), vec!["r1_100_a.webm"]);
    }

    #[test]
    fn listing_is_newest_first() {
        let names = vec![
            "r1_1700000000100_a.webm".to_owned(),
            "r1_1700000000300_c.webm".to_owned(),
            "r1_1700000000200_b.webm".to_owned(),
        ];
        assert_eq!(
            matching_recordings(names, "r1"),
            vec![
                "r1_1700000000300_c.webm",
                "r1_1700000000200_b.webm",
                "r1_1700000000100_a.webm",
            ]
        );
    }
}
