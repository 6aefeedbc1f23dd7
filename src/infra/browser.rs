//! Chromium-backed [`PageDriver`] over the DevTools protocol.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{
    Browser, BrowserConfig, Page,
    cdp::{
        browser_protocol::{
            emulation::SetEmulatedMediaParams,
            network::EventResponseReceived,
            page::{EventLifecycleEvent, PrintToPdfParams},
        },
        js_protocol::runtime::{
            ConsoleApiCalledType, EvaluateParams, EventConsoleApiCalled, EventExceptionThrown,
            RemoteObject,
        },
    },
};
use futures::StreamExt;
use serde_json::Value;
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, warn};

use crate::application::render::driver::{
    BrowserLauncher, DriverError, LaunchOptions, PageDriver, is_anomalous_status,
};

const NETWORK_IDLE: &str = "networkIdle";
const BLANK_PAGE: &str = "about:blank";

/// Launches a headless Chromium per build.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>, DriverError> {
        let mut builder = BrowserConfig::builder().request_timeout(options.navigation_timeout);
        if let Some(executable) = options.executable.as_ref() {
            builder = builder.chrome_executable(executable);
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(
                        target = "bindery::browser",
                        error = %err,
                        "Protocol handler event failed"
                    );
                }
            }
        });

        let page = match browser.new_page(BLANK_PAGE).await {
            Ok(page) => page,
            Err(err) => {
                let mut partial = ChromiumPage::new(browser, None, handler, options);
                let _ = partial.close().await;
                return Err(DriverError::Launch(err.to_string()));
            }
        };

        let mut driver = ChromiumPage::new(browser, Some(page), handler, options);
        if let Err(err) = driver.attach_hooks(options.verbose).await {
            let _ = driver.close().await;
            return Err(err);
        }
        debug!(target = "bindery::browser", sandbox = options.sandbox, "Browser launched");
        Ok(Box::new(driver))
    }
}

pub struct ChromiumPage {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    hooks: Vec<JoinHandle<()>>,
    navigation_timeout: Duration,
}

impl ChromiumPage {
    fn new(
        browser: Browser,
        page: Option<Page>,
        handler: JoinHandle<()>,
        options: &LaunchOptions,
    ) -> Self {
        Self {
            browser,
            page,
            handler,
            hooks: Vec::new(),
            navigation_timeout: options.navigation_timeout,
        }
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Protocol {
            op: "page",
            message: "page already closed".to_string(),
        })
    }

    /// Surface page exceptions, console output (verbose only) and anomalous
    /// responses as log events.
    async fn attach_hooks(&mut self, verbose: bool) -> Result<(), DriverError> {
        let page = self.page()?.clone();

        let mut exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(protocol("listen"))?;
        self.hooks.push(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|exception| exception.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                warn!(
                    target = "bindery::browser",
                    url = details.url.as_deref().unwrap_or(""),
                    line = details.line_number,
                    message = %message,
                    "Page script error"
                );
            }
        }));

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(protocol("listen"))?;
        self.hooks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let response = &event.response;
                if is_anomalous_status(response.status) {
                    warn!(
                        target = "bindery::browser",
                        url = %response.url,
                        status = response.status,
                        status_text = %response.status_text,
                        "Unexpected response status"
                    );
                }
            }
        }));

        if verbose {
            let mut console = page
                .event_listener::<EventConsoleApiCalled>()
                .await
                .map_err(protocol("listen"))?;
            self.hooks.push(tokio::spawn(async move {
                while let Some(event) = console.next().await {
                    if !is_forwarded_console(&event.r#type) {
                        continue;
                    }
                    let text = console_text(&event.args);
                    if text.is_empty() {
                        continue;
                    }
                    debug!(
                        target = "bindery::browser::console",
                        kind = ?event.r#type,
                        message = %text,
                        "Page console"
                    );
                }
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        let navigation_error = |message: String| DriverError::Navigation {
            url: url.to_string(),
            message,
        };

        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|err| navigation_error(err.to_string()))?;
        page.goto(url)
            .await
            .map_err(|err| navigation_error(err.to_string()))?;

        let idle = async {
            while let Some(event) = lifecycle.next().await {
                if event.name == NETWORK_IDLE {
                    return true;
                }
            }
            false
        };
        match timeout(self.navigation_timeout, idle).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(navigation_error("page closed before network idle".into())),
            Err(_) => Err(navigation_error(format!(
                "network did not become idle within {} ms",
                self.navigation_timeout.as_millis()
            ))),
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(DriverError::Evaluation)?;
        let result = self
            .page()?
            .evaluate_expression(params)
            .await
            .map_err(|err| DriverError::Evaluation(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn emulate_print_media(&self) -> Result<(), DriverError> {
        self.page()?
            .execute(SetEmulatedMediaParams::builder().media("print").build())
            .await
            .map_err(protocol("emulate_media"))?;
        Ok(())
    }

    async fn print_pdf(&self) -> Result<Vec<u8>, DriverError> {
        let params = PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            margin_top: Some(0.0),
            margin_bottom: Some(0.0),
            margin_left: Some(0.0),
            margin_right: Some(0.0),
            ..PrintToPdfParams::default()
        };
        self.page()?
            .pdf(params)
            .await
            .map_err(protocol("print_to_pdf"))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        for hook in self.hooks.drain(..) {
            hook.abort();
        }
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                debug!(target = "bindery::browser", error = %err, "Page close failed");
            }
        }

        let closed = self.browser.close().await.map_err(protocol("close"));
        let waited = self.browser.wait().await;
        self.handler.abort();

        closed?;
        waited.map_err(|err| DriverError::Protocol {
            op: "wait",
            message: err.to_string(),
        })?;
        debug!(target = "bindery::browser", "Browser process exited");
        Ok(())
    }
}

fn protocol<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> DriverError {
    move |err| DriverError::Protocol {
        op,
        message: err.to_string(),
    }
}

fn is_forwarded_console(kind: &ConsoleApiCalledType) -> bool {
    matches!(
        kind,
        ConsoleApiCalledType::Log
            | ConsoleApiCalledType::Info
            | ConsoleApiCalledType::Warning
            | ConsoleApiCalledType::Error
    )
}

fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .filter_map(|arg| match arg.value.as_ref() {
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
            None => arg.description.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
