// Sources of rendered constituency pages.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use snafu::prelude::*;

use crate::pipeline::*;

/// Gives the rendered page of a constituency.
pub trait PageSource {
    /// Where the page of this constituency is read from, for the logs.
    fn location(&self, constituency_id: u32) -> String;

    fn fetch(&mut self, constituency_id: u32) -> PipelineResult<String>;
}

/// Fetches the pages from the results website, one at a time.
///
/// The only rate limiting is a fixed pause before every request but the first.
/// There is no retry: a failed request fails that constituency.
pub struct HttpPageSource {
    url_template: String,
    pacer: Pacer,
    client: Client,
}

/// Decides how long to wait before each request.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Pacer {
    pause: Duration,
    requested: bool,
}

impl Pacer {
    pub fn new(pause: Duration) -> Pacer {
        Pacer {
            pause,
            requested: false,
        }
    }

    /// The wait before the next request: nothing before the first one, then
    /// the fixed pause.
    pub fn next_wait(&mut self) -> Option<Duration> {
        let first = !self.requested;
        self.requested = true;
        if first || self.pause.is_zero() {
            None
        } else {
            Some(self.pause)
        }
    }
}

impl HttpPageSource {
    pub fn new(url_template: &str, pause: Duration) -> PipelineResult<HttpPageSource> {
        let client = Client::builder()
            .user_agent(concat!("acresults/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(HttpClientSnafu {})?;
        Ok(HttpPageSource {
            url_template: url_template.to_string(),
            pacer: Pacer::new(pause),
            client,
        })
    }
}

pub fn page_url(url_template: &str, constituency_id: u32) -> String {
    url_template.replace("{}", &constituency_id.to_string())
}

impl PageSource for HttpPageSource {
    fn location(&self, constituency_id: u32) -> String {
        page_url(&self.url_template, constituency_id)
    }

    fn fetch(&mut self, constituency_id: u32) -> PipelineResult<String> {
        if let Some(wait) = self.pacer.next_wait() {
            debug!("Waiting {:?} before the next request", wait);
            thread::sleep(wait);
        }
        let url = self.location(constituency_id);
        info!("Fetching constituency {} from {}", constituency_id, url);
        self.client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .context(FetchSnafu {
                constituency_id,
                url,
            })
    }
}

/// Reads pages saved beforehand as `<dir>/<constituency id>.htm`.
pub struct DirPageSource {
    dir: PathBuf,
}

impl DirPageSource {
    pub fn new(dir: &Path) -> DirPageSource {
        DirPageSource {
            dir: dir.to_path_buf(),
        }
    }

    fn page_path(&self, constituency_id: u32) -> PathBuf {
        self.dir.join(format!("{}.htm", constituency_id))
    }
}

impl PageSource for DirPageSource {
    fn location(&self, constituency_id: u32) -> String {
        self.page_path(constituency_id).display().to_string()
    }

    fn fetch(&mut self, constituency_id: u32) -> PipelineResult<String> {
        let p = self.page_path(constituency_id);
        debug!("Reading constituency {} from {:?}", constituency_id, p);
        fs::read_to_string(&p).context(IoSnafu {
            path: p.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_template() {
        assert_eq!(
            page_url(
                "https://results.eci.gov.in/ResultAcGenNov2025/candidateswise-S04{}.htm",
                12
            ),
            "https://results.eci.gov.in/ResultAcGenNov2025/candidateswise-S0412.htm"
        );
        assert_eq!(page_url("http://localhost/page", 3), "http://localhost/page");
    }

    #[test]
    fn pause_between_requests() {
        let mut pacer = Pacer::new(Duration::from_millis(2000));
        assert_eq!(pacer.next_wait(), None);
        assert_eq!(pacer.next_wait(), Some(Duration::from_millis(2000)));
        assert_eq!(pacer.next_wait(), Some(Duration::from_millis(2000)));

        let mut no_pause = Pacer::new(Duration::from_millis(0));
        assert_eq!(no_pause.next_wait(), None);
        assert_eq!(no_pause.next_wait(), None);
    }

    #[test]
    fn http_source_starts_without_pause() {
        let mut source = HttpPageSource::new(
            "http://localhost/candidateswise-S04{}.htm",
            Duration::from_millis(500),
        )
        .unwrap();
        assert_eq!(source.location(5), "http://localhost/candidateswise-S045.htm");
        assert_eq!(source.pacer.next_wait(), None);
        assert_eq!(source.pacer.next_wait(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn saved_pages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("7.htm"), "<html></html>").unwrap();
        let mut source = DirPageSource::new(dir.path());
        assert_eq!(source.fetch(7).unwrap(), "<html></html>");
        assert!(matches!(source.fetch(8), Err(PipelineError::Io { .. })));
        assert!(source.location(8).ends_with("8.htm"));
    }
}
