#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bindery::{
    application::render::driver::{BrowserLauncher, DriverError, LaunchOptions, PageDriver},
    config::{self, CliArgs, Command, ResolvedConfig},
};
use clap::Parser;
use lopdf::{Dictionary, Document, Object, dictionary};
use serde_json::{Value, json};

/// Resolve configuration as `bindery build <argv>` would from `cwd`.
pub fn resolve_in(cwd: &Path, argv: &[&str]) -> ResolvedConfig {
    let mut full = vec!["bindery", "build"];
    full.extend_from_slice(argv);
    let Command::Build(args) = CliArgs::parse_from(full).command else {
        panic!("expected build command");
    };
    config::resolve(&args, cwd).expect("valid configuration")
}

/// A one-page PDF whose catalog declares the given named destinations.
pub fn sample_pdf(destinations: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 420.into(), 595.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let mut dests = Dictionary::new();
    for name in destinations {
        dests.set(
            name.as_bytes().to_vec(),
            Object::Array(vec![
                Object::Reference(page_id),
                Object::Name(b"XYZ".to_vec()),
                Object::Integer(0),
                Object::Integer(595),
                Object::Null,
            ]),
        );
    }
    let dests_id = doc.add_object(dests);

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Dests" => dests_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize fixture");
    bytes
}

/// Scripted responses for the in-page viewer.
#[derive(Debug)]
pub struct ViewerScript {
    pub ready_state: &'static str,
    pub viewer_present: bool,
    /// Viewer checks that fail before the page answers normally.
    pub viewer_check_failures: usize,
    /// Whether the viewer reports the TOC action as done.
    pub toc_event: bool,
    pub metadata: Value,
    pub toc: Value,
    pub pdf: Vec<u8>,
}

impl Default for ViewerScript {
    fn default() -> Self {
        Self {
            ready_state: "complete",
            viewer_present: true,
            viewer_check_failures: 0,
            toc_event: true,
            metadata: json!({
                "http://purl.org/dc/terms/title": [{"v": "Scripted Title"}],
                "http://purl.org/dc/terms/creator": [{"v": "Scripted Author"}],
            }),
            toc: json!([
                {"id": "intro", "title": "Introduction", "children": [
                    {"id": "details", "title": "Details"}
                ]}
            ]),
            pdf: sample_pdf(&["intro", "details"]),
        }
    }
}

/// Shared record of what the orchestrator asked the fake browser to do.
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub calls: Mutex<Vec<String>>,
    pub closed: AtomicBool,
    pub launched: AtomicBool,
    pub navigated_to: Mutex<Option<String>>,
}

impl BrowserLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("log lock").clone()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("log lock").push(call.to_string());
    }
}

pub struct FakeLauncher {
    pub script: Arc<ViewerScript>,
    pub log: Arc<BrowserLog>,
}

impl FakeLauncher {
    pub fn new(script: ViewerScript) -> Self {
        Self {
            script: Arc::new(script),
            log: Arc::new(BrowserLog::default()),
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn PageDriver>, DriverError> {
        self.log.launched.store(true, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            check_failures: AtomicUsize::new(self.script.viewer_check_failures),
            script: Arc::clone(&self.script),
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakePage {
    check_failures: AtomicUsize,
    script: Arc<ViewerScript>,
    log: Arc<BrowserLog>,
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        *self.log.navigated_to.lock().expect("log lock") = Some(url.to_string());
        self.log.record("navigate");
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        if expression.contains("new Promise") {
            assert!(expression.contains("payload.a !== \"toc\""));
            self.log.record("toc_shown");
            if !self.script.toc_event {
                std::future::pending::<()>().await;
            }
            return Ok(Value::Bool(true));
        }
        if expression.contains("typeof window.coreViewer") {
            let failing = self
                .check_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                self.log.record("viewer_check_failed");
                return Err(DriverError::Evaluation(
                    "Execution context was destroyed.".into(),
                ));
            }
            return Ok(Value::Bool(self.script.viewer_present));
        }
        if expression.ends_with(".readyState") {
            self.log.record("ready_state");
            return Ok(Value::String(self.script.ready_state.to_string()));
        }
        if expression.ends_with("getMetadata()") {
            self.log.record("metadata");
            return Ok(self.script.metadata.clone());
        }
        if expression.ends_with("getTOC()") {
            self.log.record("toc_read");
            return Ok(self.script.toc.clone());
        }
        if expression.contains("showTOC(false)") {
            self.log.record("toc_hidden");
            return Ok(Value::Null);
        }
        Err(DriverError::Evaluation(format!("unexpected expression: {expression}")))
    }

    async fn emulate_print_media(&self) -> Result<(), DriverError> {
        self.log.record("print_media");
        Ok(())
    }

    async fn print_pdf(&self) -> Result<Vec<u8>, DriverError> {
        self.log.record("print");
        Ok(self.script.pdf.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
