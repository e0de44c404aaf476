// Shared fakes for the backend and controller tests.

use crate::cli::http_client::{HttpClient, HttpResponse};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PostForm {
        url: String,
        api_key: String,
        fields: Vec<(String, String)>,
        file: PathBuf,
    },
    Get {
        url: String,
        api_key: String,
    },
    Download {
        url: String,
        api_key: String,
    },
    Delete {
        url: String,
        api_key: String,
    },
}

pub struct FakeDownload {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// connection drops after `body` was written
    pub cut: Option<String>,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct FakeHttp {
    responses: RefCell<VecDeque<Result<HttpResponse>>>,
    downloads: RefCell<VecDeque<Result<FakeDownload>>>,
    calls: RefCell<Vec<Call>>,
}

impl FakeHttp {
    pub fn new() -> FakeHttp {
        FakeHttp::default()
    }

    pub fn respond_json(self, body: &str) -> FakeHttp {
        self.respond(HttpResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        })
    }

    pub fn respond(self, response: HttpResponse) -> FakeHttp {
        self.responses.borrow_mut().push_back(Ok(response));
        self
    }

    pub fn fail(self, message: &str) -> FakeHttp {
        self.responses.borrow_mut().push_back(Err(anyhow!(message.to_string())));
        self
    }

    pub fn serve(self, content_type: &str, body: &[u8]) -> FakeHttp {
        self.downloads.borrow_mut().push_back(Ok(FakeDownload {
            content_type: Some(content_type.to_string()),
            body: body.to_vec(),
            cut: None,
        }));
        self
    }

    /// Writes `partial` and then fails the download.
    pub fn interrupt(self, partial: &[u8], message: &str) -> FakeHttp {
        self.downloads.borrow_mut().push_back(Ok(FakeDownload {
            content_type: Some("application/zip".to_string()),
            body: partial.to_vec(),
            cut: Some(message.to_string()),
        }));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn next_response(&self) -> Result<HttpResponse> {
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no response queued")))
    }
}

impl HttpClient for FakeHttp {
    fn post_form(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(String, String)],
        file: &Path,
    ) -> Result<HttpResponse> {
        self.calls.borrow_mut().push(Call::PostForm {
            url: url.to_string(),
            api_key: api_key.to_string(),
            fields: fields.to_vec(),
            file: file.to_path_buf(),
        });
        self.next_response()
    }

    fn get(&self, url: &str, api_key: &str) -> Result<HttpResponse> {
        self.calls.borrow_mut().push(Call::Get {
            url: url.to_string(),
            api_key: api_key.to_string(),
        });
        self.next_response()
    }

    fn download(&self, url: &str, api_key: &str, sink: &mut dyn Write) -> Result<Option<String>> {
        self.calls.borrow_mut().push(Call::Download {
            url: url.to_string(),
            api_key: api_key.to_string(),
        });
        let download = self
            .downloads
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no download queued")))?;

        sink.write_all(&download.body)?;
        match download.cut {
            Some(message) => Err(anyhow!(message)),
            None => Ok(download.content_type),
        }
    }

    fn delete(&self, url: &str, api_key: &str) -> Result<HttpResponse> {
        self.calls.borrow_mut().push(Call::Delete {
            url: url.to_string(),
            api_key: api_key.to_string(),
        });
        self.next_response()
    }
}

/// Empty directory, removed when the guard drops.
pub fn scratch_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("bulk-exchange-")
        .tempdir()
        .unwrap()
}

/// A small csv in its own scratch dir. Keep the guard alive while the file is
/// in use.
pub fn upload_file() -> (TempDir, PathBuf) {
    let dir = scratch_dir();
    let path = dir.path().join("test.csv");
    std::fs::write(&path, "id,name\n1,test\n").unwrap();
    (dir, path)
}
