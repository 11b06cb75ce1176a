//! Fragmented MP4 reassembly.
//!
//! A fragmented video is a master playlist listing one media playlist per
//! resolution. The largest rendition's playlist names exactly one
//! initialization file (`EXT-X-MAP`) followed by `.m4s` fragments; the video
//! is the init file's bytes followed by every fragment's bytes in playlist
//! order.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};

use crate::api::client::XClient;
use crate::error::{Error, Result};
use crate::media::item::dimensions_from_url;

/// Downloads and concatenates fragmented renditions.
pub struct SegmentReassembler {
    client: Arc<XClient>,
    concurrency: usize,
}

impl SegmentReassembler {
    pub fn new(client: Arc<XClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Reassemble the highest-resolution rendition behind `manifest_url`.
    ///
    /// Any failed fetch aborts the whole reassembly; nothing is returned for
    /// a partial video.
    pub async fn reassemble(
        &self,
        post_url: &str,
        manifest_url: &str,
        progress: &ProgressBar,
    ) -> Result<Vec<u8>> {
        let content = self.client.fetch_bytes(post_url, manifest_url).await?;

        let (playlist_url, media) = match parse(post_url, manifest_url, &content)? {
            Playlist::MasterPlaylist(master) => {
                let rendition = best_rendition(&master).ok_or_else(|| Error::ProtocolShape {
                    post_url: post_url.to_string(),
                    url: Some(manifest_url.to_string()),
                    message: "master playlist lists no video rendition with a resolution"
                        .to_string(),
                })?;
                let rendition_url = resolve_url(manifest_url, rendition)?;
                tracing::debug!("Selected rendition {}", rendition_url);

                let content = self.client.fetch_bytes(post_url, &rendition_url).await?;
                match parse(post_url, &rendition_url, &content)? {
                    Playlist::MediaPlaylist(media) => (rendition_url, media),
                    Playlist::MasterPlaylist(_) => {
                        return Err(Error::ProtocolShape {
                            post_url: post_url.to_string(),
                            url: Some(rendition_url),
                            message: "expected a media playlist".to_string(),
                        })
                    }
                }
            }
            Playlist::MediaPlaylist(media) => (manifest_url.to_string(), media),
        };

        let container = single_container(post_url, &playlist_url, &media)?;
        let fragments: Vec<String> = media
            .segments
            .iter()
            .map(|segment| resolve_url(&playlist_url, &segment.uri))
            .collect::<Result<_>>()?;

        progress.set_length(fragments.len() as u64 + 1);

        let mut output = self.client.fetch_bytes(post_url, &container).await?;
        progress.inc(1);

        for bytes in self.fetch_fragments(post_url, &fragments, progress).await? {
            output.extend_from_slice(&bytes);
        }

        tracing::debug!(
            "Reassembled {} fragment(s) into {} bytes",
            fragments.len(),
            output.len()
        );
        Ok(output)
    }

    /// Fetch fragments concurrently, returning them in playlist order.
    async fn fetch_fragments(
        &self,
        post_url: &str,
        fragments: &[String],
        progress: &ProgressBar,
    ) -> Result<Vec<Vec<u8>>> {
        // The first failed fetch drops the stream, cancelling fetches in flight.
        let mut ordered: Vec<(usize, Vec<u8>)> = stream::iter(fragments.iter().enumerate())
            .map(|(i, url)| async move {
                let bytes = self.client.fetch_bytes(post_url, url).await?;
                progress.inc(1);
                Ok::<_, Error>((i, bytes))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        ordered.sort_by_key(|(i, _)| *i);

        Ok(ordered.into_iter().map(|(_, bytes)| bytes).collect())
    }
}

fn parse(post_url: &str, url: &str, content: &[u8]) -> Result<Playlist> {
    m3u8_rs::parse_playlist_res(content).map_err(|e| Error::ProtocolShape {
        post_url: post_url.to_string(),
        url: Some(url.to_string()),
        message: format!("unparseable playlist: {:?}", e),
    })
}

/// URI of the video rendition with the largest width × height.
fn best_rendition(master: &MasterPlaylist) -> Option<&str> {
    let mut best: Option<(u64, &str)> = None;

    for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
        let area = match &variant.resolution {
            Some(r) => r.width * r.height,
            None => match dimensions_from_url(&variant.uri) {
                Some((w, h)) => u64::from(w) * u64::from(h),
                None => continue,
            },
        };

        if best.map_or(true, |(current, _)| area > current) {
            best = Some((area, variant.uri.as_str()));
        }
    }

    best.map(|(_, uri)| uri)
}

/// The one initialization file of a media playlist.
fn single_container(post_url: &str, playlist_url: &str, media: &MediaPlaylist) -> Result<String> {
    let maps: BTreeSet<&str> = media
        .segments
        .iter()
        .filter_map(|s| s.map.as_ref())
        .map(|m| m.uri.as_str())
        .collect();

    if maps.len() != 1 {
        return Err(Error::ProtocolShape {
            post_url: post_url.to_string(),
            url: Some(playlist_url.to_string()),
            message: format!("expected exactly 1 mp4 container, found {}", maps.len()),
        });
    }

    let uri = maps.into_iter().next().unwrap_or_default();
    resolve_url(playlist_url, uri)
}

/// Resolve a potentially relative URL against a base URL.
fn resolve_url(base: &str, path: &str) -> Result<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(path.to_string());
    }

    let base_url = url::Url::parse(base)?;
    let resolved = base_url.join(path)?;
    Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::Endpoints;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POST: &str = "https://x.com/a/status/1";

    const MASTER: &str = "#EXTM3U
#EXT-X-INDEPENDENT-SEGMENTS
#EXT-X-STREAM-INF:AVERAGE-BANDWIDTH=256000,BANDWIDTH=300000,RESOLUTION=480x270,CODECS=\"avc1.4D401E\"
/ext_tw_video/1/pu/pl/avc1/480x270/low.m3u8?container=fmp4
#EXT-X-STREAM-INF:AVERAGE-BANDWIDTH=2176000,BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS=\"avc1.640020\"
/ext_tw_video/1/pu/pl/avc1/1280x720/high.m3u8?container=fmp4
#EXT-X-STREAM-INF:AVERAGE-BANDWIDTH=832000,BANDWIDTH=950000,RESOLUTION=640x360,CODECS=\"avc1.4D401F\"
/ext_tw_video/1/pu/pl/avc1/640x360/mid.m3u8?container=fmp4
";

    fn media_playlist(maps: &[&str]) -> String {
        let mut text = String::from(
            "#EXTM3U\n#EXT-X-VERSION:6\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-TARGETDURATION:3\n#EXT-X-PLAYLIST-TYPE:VOD\n",
        );
        for (i, fragment) in ["f1", "f2", "f3"].iter().enumerate() {
            if let Some(map) = maps.get(i) {
                text.push_str(&format!("#EXT-X-MAP:URI=\"{}\"\n", map));
            }
            text.push_str(&format!(
                "#EXTINF:3.000,\n/ext_tw_video/1/pu/vid/avc1/{}/1280x720/{}.m4s\n",
                i * 3000,
                fragment
            ));
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    async fn mount(server: &MockServer, route: &str, body: &[u8], delay_ms: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body.to_vec())
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(server)
            .await;
    }

    fn reassembler(server: &MockServer) -> SegmentReassembler {
        let client = XClient::new(
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/120.0".to_string(),
            Duration::from_secs(5),
            Endpoints::with_base(&server.uri()),
        )
        .unwrap();
        SegmentReassembler::new(Arc::new(client), 3)
    }

    fn master_url(server: &MockServer) -> String {
        format!("{}/ext_tw_video/1/pu/pl/master.m3u8?tag=12&container=fmp4", server.uri())
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://video.twimg.com/ext_tw_video/1/pu/pl/a.m3u8?x=1", "/ext_tw_video/1/b.m4s")
                .unwrap(),
            "https://video.twimg.com/ext_tw_video/1/b.m4s"
        );
        assert_eq!(
            resolve_url("https://a.example/pl/a.m3u8", "https://b.example/c.m4s").unwrap(),
            "https://b.example/c.m4s"
        );
    }

    #[tokio::test]
    async fn test_reassembly_preserves_order_under_concurrency() {
        let server = MockServer::start().await;
        mount(&server, "/ext_tw_video/1/pu/pl/master.m3u8", MASTER.as_bytes(), 0).await;
        let playlist = media_playlist(&["/ext_tw_video/1/pu/vid/avc1/0/0/1280x720/init.mp4"]);
        mount(&server, "/ext_tw_video/1/pu/pl/avc1/1280x720/high.m3u8", playlist.as_bytes(), 0).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/0/0/1280x720/init.mp4", b"INIT", 0).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/0/1280x720/f1.m4s", b"-one", 300).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/3000/1280x720/f2.m4s", b"-two", 150).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/6000/1280x720/f3.m4s", b"-three", 0).await;

        let progress = ProgressBar::hidden();
        let bytes = reassembler(&server)
            .reassemble(POST, &master_url(&server), &progress)
            .await
            .unwrap();

        assert_eq!(bytes, b"INIT-one-two-three".to_vec());
        assert_eq!(progress.position(), 4);

        let requested: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert!(!requested.iter().any(|p| p.ends_with("low.m3u8") || p.ends_with("mid.m3u8")));
    }

    #[tokio::test]
    async fn test_two_containers_is_protocol_shape_error() {
        let server = MockServer::start().await;
        mount(&server, "/ext_tw_video/1/pu/pl/master.m3u8", MASTER.as_bytes(), 0).await;
        let playlist = media_playlist(&["/init-a.mp4", "/init-b.mp4"]);
        mount(&server, "/ext_tw_video/1/pu/pl/avc1/1280x720/high.m3u8", playlist.as_bytes(), 0).await;

        let err = reassembler(&server)
            .reassemble(POST, &master_url(&server), &ProgressBar::hidden())
            .await
            .unwrap_err();

        match err {
            Error::ProtocolShape { post_url, url, .. } => {
                assert_eq!(post_url, POST);
                assert!(url.unwrap().ends_with("high.m3u8?container=fmp4"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_container_is_protocol_shape_error() {
        let server = MockServer::start().await;
        mount(&server, "/ext_tw_video/1/pu/pl/master.m3u8", MASTER.as_bytes(), 0).await;
        let playlist = media_playlist(&[]);
        mount(&server, "/ext_tw_video/1/pu/pl/avc1/1280x720/high.m3u8", playlist.as_bytes(), 0).await;

        let err = reassembler(&server)
            .reassemble(POST, &master_url(&server), &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolShape { .. }));
    }

    #[tokio::test]
    async fn test_failed_fragment_cancels_pending_fetches() {
        let server = MockServer::start().await;
        mount(&server, "/ext_tw_video/1/pu/pl/master.m3u8", MASTER.as_bytes(), 0).await;
        let playlist = media_playlist(&["/init.mp4"]);
        mount(&server, "/ext_tw_video/1/pu/pl/avc1/1280x720/high.m3u8", playlist.as_bytes(), 0).await;
        mount(&server, "/init.mp4", b"INIT", 0).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/3000/1280x720/f2.m4s", b"-two", 3000).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/6000/1280x720/f3.m4s", b"-three", 3000).await;

        let started = tokio::time::Instant::now();
        let err = reassembler(&server)
            .reassemble(POST, &master_url(&server), &ProgressBar::hidden())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { status: Some(404), .. }));
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_failed_fragment_aborts() {
        let server = MockServer::start().await;
        mount(&server, "/ext_tw_video/1/pu/pl/master.m3u8", MASTER.as_bytes(), 0).await;
        let playlist = media_playlist(&["/init.mp4"]);
        mount(&server, "/ext_tw_video/1/pu/pl/avc1/1280x720/high.m3u8", playlist.as_bytes(), 0).await;
        mount(&server, "/init.mp4", b"INIT", 0).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/0/1280x720/f1.m4s", b"-one", 0).await;
        mount(&server, "/ext_tw_video/1/pu/vid/avc1/6000/1280x720/f3.m4s", b"-three", 0).await;

        let err = reassembler(&server)
            .reassemble(POST, &master_url(&server), &ProgressBar::hidden())
            .await
            .unwrap_err();

        match err {
            Error::Transport { url, status, .. } => {
                assert!(url.ends_with("f2.m4s"));
                assert_eq!(status, Some(404));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
