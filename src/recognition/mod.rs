// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Song recognition - vendor response model, capture, client and the
//! periodic re-identification session

mod capture;
mod client;
mod session;
mod tracklist;

pub use capture::{encode_wav, AudioCapture, BufferCapture, FileCapture};
pub use client::{RecognitionClient, Recognizer};
pub use session::{status, RecognitionSession, SessionState};
pub use tracklist::{TrackRecord, Tracklist};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Identify response as returned by the vendor and relayed by the proxy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorResponse {
    pub status: VendorStatus,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorStatus {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub music: Vec<Music>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Music {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Option<Vec<Artist>>,
    #[serde(default)]
    pub album: Option<Album>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub name: Option<String>,
}

impl VendorResponse {
    /// First match, or `VendorRejected` for a non-zero status or an empty result
    pub fn into_song(self) -> Result<Song> {
        if self.status.code != 0 {
            return Err(TrackerError::VendorRejected {
                code: self.status.code,
                msg: self.status.msg,
            });
        }
        self.metadata
            .and_then(|m| m.music.into_iter().next())
            .map(Song::from)
            .ok_or(TrackerError::VendorRejected {
                code: self.status.code,
                msg: "empty result".to_string(),
            })
    }
}

/// A recognised song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub title: Option<String>,
    pub artists: Vec<String>,
    /// `Some` whenever the vendor sent an album, even without a name
    pub album: Option<String>,
}

impl Song {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(UNKNOWN_TITLE)
    }

    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            self.artists.join(", ")
        }
    }

    pub fn album_line(&self) -> Option<String> {
        self.album.as_ref().map(|name| format!("Album: {}", name))
    }
}

impl From<Music> for Song {
    fn from(music: Music) -> Self {
        Self {
            title: music.title,
            artists: music
                .artists
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.name)
                .collect(),
            album: music.album.map(|a| {
                a.name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
            }),
        }
    }
}

impl std::fmt::Display for Song {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.display_title(), self.artist_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_is_used() {
        let body = r#"{
            "status": {"code": 0, "msg": "Success"},
            "metadata": {"music": [
                {"title": "Around the World", "artists": [{"name": "Daft Punk"}], "album": {"name": "Homework"}},
                {"title": "Other"}
            ]}
        }"#;
        let song = serde_json::from_str::<VendorResponse>(body).unwrap().into_song().unwrap();

        assert_eq!(song.display_title(), "Around the World");
        assert_eq!(song.artist_line(), "Daft Punk");
        assert_eq!(song.album_line().as_deref(), Some("Album: Homework"));
    }

    #[test]
    fn test_fallbacks() {
        let song = Song::from(Music {
            title: None,
            artists: None,
            album: Some(Album { name: None }),
        });
        assert_eq!(song.display_title(), "Unknown Title");
        assert_eq!(song.artist_line(), "Unknown Artist");
        assert_eq!(song.album_line().as_deref(), Some("Album: Unknown Album"));

        let song = Song::from(Music {
            title: Some("Duet".into()),
            artists: Some(vec![Artist { name: "A".into() }, Artist { name: "B".into() }]),
            album: None,
        });
        assert_eq!(song.artist_line(), "A, B");
        assert_eq!(song.album_line(), None);
    }

    #[test]
    fn test_no_match_is_vendor_rejected() {
        let no_result: VendorResponse =
            serde_json::from_str(r#"{"status": {"code": 1001, "msg": "No result"}}"#).unwrap();
        match no_result.into_song() {
            Err(TrackerError::VendorRejected { code, msg }) => {
                assert_eq!(code, 1001);
                assert_eq!(msg, "No result");
            }
            other => panic!("unexpected {:?}", other),
        }

        let empty: VendorResponse =
            serde_json::from_str(r#"{"status": {"code": 0, "msg": "Success"}, "metadata": {"music": []}}"#).unwrap();
        assert!(empty.into_song().unwrap_err().is_no_match());
    }
}
