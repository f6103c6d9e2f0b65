//! Interaction sequencer
//!
//! A [`Sequence`] is a named, fixed list of steps run in order against one
//! session. [`authenticate`] builds the only reusable one: open the entry
//! page, fill username and secret, submit, then wait for the success signal.
//! Nothing is retried; the first failing step ends the sequence.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use crate::credentials::Credentials;
use crate::locator::{resolve, Handle};
use crate::session::traits::{ElementReference, PageSession};
use crate::url_pattern::UrlPattern;
use crate::wait::{wait_until, WaitOutcome};
use crate::{Error, Result};

/// Bounded wait for the post-submit signal
pub const AUTH_TIMEOUT_MS: u64 = 10_000;

pub const SAUCEDEMO_URL: &str = "https://www.saucedemo.com/";
pub const GLOBALSQA_LOGIN_URL: &str =
    "https://www.globalsqa.com/angularJs-protractor/registration-login-example/#/login";
pub const GLOBALSQA_REGISTER_URL: &str =
    "https://www.globalsqa.com/angularJs-protractor/registration-login-example/#/register";

/// Observable proof that a sequence reached its goal
#[derive(Debug, Clone)]
pub enum SuccessSignal {
    /// The location matches a pattern
    Url(UrlPattern),
    /// An element becomes visible
    Element(ElementReference),
}

impl fmt::Display for SuccessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessSignal::Url(pattern) => write!(f, "url {}", pattern),
            SuccessSignal::Element(reference) => write!(f, "visible {}", reference),
        }
    }
}

/// One step of a sequence
#[derive(Debug, Clone)]
pub enum Step {
    Goto(String),
    Fill {
        target: ElementReference,
        value: String,
        /// Keep the value out of logs
        sensitive: bool,
    },
    Click(ElementReference),
    Check(ElementReference),
    /// Wait until `success` is observed or `failure` becomes visible
    WaitFor {
        success: SuccessSignal,
        failure: Option<ElementReference>,
        timeout_ms: u64,
    },
}

impl Step {
    fn kind(&self) -> &'static str {
        match self {
            Step::Goto(_) => "goto",
            Step::Fill { .. } => "fill",
            Step::Click(_) => "click",
            Step::Check(_) => "check",
            Step::WaitFor { .. } => "wait_for",
        }
    }
}

/// What one poll of a `WaitFor` step saw
#[derive(Debug, Clone, PartialEq)]
enum Signal {
    Success,
    Failure(String),
    Pending(String),
}

/// Named, ordered list of steps
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    steps: Vec<Step>,
}

impl Sequence {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self, session: &Arc<dyn PageSession>) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            let span = info_span!("step", sequence = %self.name, index, kind = step.kind());
            run_step(session, step).instrument(span).await?;
        }
        Ok(())
    }
}

async fn run_step(session: &Arc<dyn PageSession>, step: &Step) -> Result<()> {
    match step {
        Step::Goto(url) => session.goto(url).await,
        Step::Fill {
            target,
            value,
            sensitive,
        } => {
            debug!(
                "fill {} with {}",
                target,
                if *sensitive { "<redacted>" } else { value.as_str() }
            );
            resolve(session, target.clone()).fill(value).await
        }
        Step::Click(target) => resolve(session, target.clone()).click().await,
        Step::Check(target) => resolve(session, target.clone()).check().await,
        Step::WaitFor {
            success,
            failure,
            timeout_ms,
        } => wait_for_signal(session, success, failure.as_ref(), *timeout_ms).await,
    }
}

async fn observe_signal(
    session: &Arc<dyn PageSession>,
    success: &SuccessSignal,
    failure: Option<&ElementReference>,
) -> Result<Signal> {
    let location = session.current_url().await?;

    let succeeded = match success {
        SuccessSignal::Url(pattern) => pattern.matches(&location),
        SuccessSignal::Element(reference) => resolve(session, reference.clone()).first().is_visible().await?,
    };
    if succeeded {
        return Ok(Signal::Success);
    }

    if let Some(reference) = failure {
        let alert: Handle = resolve(session, reference.clone()).first();
        if alert.is_visible().await? {
            return Ok(Signal::Failure(alert.text_content().await?.trim().to_string()));
        }
    }

    Ok(Signal::Pending(location))
}

async fn wait_for_signal(
    session: &Arc<dyn PageSession>,
    success: &SuccessSignal,
    failure: Option<&ElementReference>,
    timeout_ms: u64,
) -> Result<()> {
    let options = session.wait_options().with_timeout(timeout_ms);
    let outcome = wait_until(
        options,
        move || async move {
            match observe_signal(session, success, failure).await {
                // The page navigated mid-poll; look again on the next one
                Err(Error::StaleHandle { .. }) => Ok(Signal::Pending(session.current_url().await?)),
                other => other,
            }
        },
        |signal| !matches!(signal, Signal::Pending(_)),
    )
    .await?;

    match outcome {
        WaitOutcome::Satisfied(Signal::Failure(message)) => Err(Error::AuthenticationRejected {
            location: session.current_url().await.unwrap_or_default(),
            message,
        }),
        WaitOutcome::Satisfied(_) => {
            debug!("Observed {}", success);
            Ok(())
        }
        WaitOutcome::TimedOut(last) => {
            let location = match last {
                Some(Signal::Pending(location)) => location,
                _ => session.current_url().await.unwrap_or_default(),
            };
            Err(Error::AuthenticationTimeout {
                signal: success.to_string(),
                location,
                timeout_ms,
            })
        }
    }
}

/// Where and how to log in
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub entry_url: String,
    pub username_field: ElementReference,
    pub secret_field: ElementReference,
    pub submit: ElementReference,
    pub success_signal: SuccessSignal,
    /// Element the site shows when it rejects the credentials
    pub failure_signal: Option<ElementReference>,
    pub timeout_ms: u64,
}

impl AuthConfig {
    pub fn new<S: Into<String>>(
        entry_url: S,
        username_field: ElementReference,
        secret_field: ElementReference,
        submit: ElementReference,
        success_signal: SuccessSignal,
    ) -> Self {
        Self {
            entry_url: entry_url.into(),
            username_field,
            secret_field,
            submit,
            success_signal,
            failure_signal: None,
            timeout_ms: AUTH_TIMEOUT_MS,
        }
    }

    pub fn with_failure_signal(mut self, reference: ElementReference) -> Self {
        self.failure_signal = Some(reference);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Swag Labs demo shop
    pub fn saucedemo() -> Self {
        Self::new(
            SAUCEDEMO_URL,
            ElementReference::id("user-name"),
            ElementReference::id("password"),
            ElementReference::id("login-button"),
            SuccessSignal::Url(UrlPattern::from("**/inventory.html")),
        )
        .with_failure_signal(ElementReference::attribute("data-test", "error"))
    }

    /// AngularJS registration/login example; success lands on the `#/` route
    pub fn globalsqa() -> Self {
        Self::new(
            GLOBALSQA_LOGIN_URL,
            ElementReference::id("username"),
            ElementReference::id("password"),
            ElementReference::css(r#"button[type="submit"]"#),
            SuccessSignal::Url(UrlPattern::from("*#/")),
        )
        .with_failure_signal(ElementReference::css(".alert-danger"))
    }

    /// The fixed login sequence for `credentials`
    pub fn sequence(&self, credentials: &Credentials) -> Sequence {
        Sequence::new("authenticate")
            .step(Step::Goto(self.entry_url.clone()))
            .step(Step::Fill {
                target: self.username_field.clone(),
                value: credentials.username().to_string(),
                sensitive: false,
            })
            .step(Step::Fill {
                target: self.secret_field.clone(),
                value: credentials.secret().to_string(),
                sensitive: true,
            })
            .step(Step::Click(self.submit.clone()))
            .step(Step::WaitFor {
                success: self.success_signal.clone(),
                failure: self.failure_signal.clone(),
                timeout_ms: self.timeout_ms,
            })
    }
}

/// Log in and block until the success signal is observed.
///
/// Fails with `AuthenticationRejected` when the failure signal shows up first
/// and with `AuthenticationTimeout` when neither appears in time.
#[instrument(skip_all, fields(entry = %config.entry_url, user = %credentials.username()))]
pub async fn authenticate(
    session: &Arc<dyn PageSession>,
    credentials: &Credentials,
    config: &AuthConfig,
) -> Result<()> {
    if !credentials.is_complete() {
        warn!("Authenticating with incomplete credentials");
    }

    config.sequence(credentials).run(session).await?;
    info!("Authenticated at {}", session.current_url().await?);
    Ok(())
}
