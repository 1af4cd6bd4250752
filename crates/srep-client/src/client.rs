//! The srep API client.
//!
//! `Client` issues the validated JSON requests of the play lifecycle and
//! the scenario catalog, and opens play shells. Every call takes a [`CallContext`]; cancelling it or
//! letting its deadline pass aborts the request in flight.

use std::future::Future;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use srep_core::context::CallContext;
use srep_core::error::{SrepError, SrepResult};
use srep_core::scenarios::Metadata;

use crate::plays::*;
use crate::relay::{self, ShellOptions, ShellOutcome, TerminalSize};
use crate::scenarios::*;
use crate::transport::{self, MessageChannel, ShellTarget, WsStream, USER_AGENT};

pub const DEFAULT_URL: &str = "api.srep.io";
pub const DEFAULT_SCHEME: &str = "https";

/// Where and how to reach the API.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Host (and optional port) of the API, without scheme.
    pub url: String,
    /// `https` or `http`. The shell socket uses `wss` or `ws` to match.
    pub scheme: String,
    /// Bearer token. Empty means anonymous.
    pub token: String,
    /// Per-request timeout for lifecycle calls.
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            token: String::new(),
            timeout: None,
        }
    }
}

pub struct Client {
    http: reqwest::Client,
    options: ClientOptions,
}

impl Client {
    /// Build a client; blank `url`/`scheme` fall back to the defaults.
    pub fn new(mut options: ClientOptions) -> SrepResult<Self> {
        if options.url.is_empty() {
            options.url = DEFAULT_URL.to_string();
        }
        if options.scheme.is_empty() {
            options.scheme = DEFAULT_SCHEME.to_string();
        }
        options.scheme = options.scheme.to_ascii_lowercase();
        if !matches!(options.scheme.as_str(), "http" | "https") {
            return Err(SrepError::InvalidConfig(format!(
                "unsupported scheme {:?} (expected http or https)",
                options.scheme
            )));
        }

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SrepError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, options })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn start_play(
        &self,
        ctx: &CallContext,
        req: &StartPlayRequest,
    ) -> SrepResult<StartPlayResponse> {
        self.call(ctx, Method::POST, "/plays", req).await
    }

    pub async fn find_play(
        &self,
        ctx: &CallContext,
        req: &FindPlayRequest,
    ) -> SrepResult<FindPlayResponse> {
        self.call(ctx, Method::GET, &format!("/plays/{}", req.id), req)
            .await
    }

    pub async fn get_plays(
        &self,
        ctx: &CallContext,
        req: &GetPlaysRequest,
    ) -> SrepResult<GetPlaysResponse> {
        self.call(ctx, Method::GET, "/plays", req).await
    }

    pub async fn get_active_play(
        &self,
        ctx: &CallContext,
        req: &GetActivePlayRequest,
    ) -> SrepResult<GetActivePlayResponse> {
        self.call(ctx, Method::GET, "/plays/active", req).await
    }

    pub async fn cancel_play(
        &self,
        ctx: &CallContext,
        req: &CancelPlayRequest,
    ) -> SrepResult<CancelPlayResponse> {
        self.call(ctx, Method::POST, "/plays/cancel", req).await
    }

    pub async fn check_play(
        &self,
        ctx: &CallContext,
        req: &CheckPlayRequest,
    ) -> SrepResult<CheckPlayResponse> {
        self.call(ctx, Method::POST, "/plays/check", req).await
    }

    pub async fn get_scenarios(
        &self,
        ctx: &CallContext,
        req: &GetScenariosRequest,
    ) -> SrepResult<GetScenariosResponse> {
        self.call(ctx, Method::GET, "/scenarios", req).await
    }

    pub async fn find_scenario(
        &self,
        ctx: &CallContext,
        req: &FindScenarioRequest,
    ) -> SrepResult<FindScenarioResponse> {
        self.call(ctx, Method::GET, &format!("/scenarios/{}", req.scenario), req)
            .await
    }

    /// The whole scenario catalog, served as a bare list.
    pub async fn get_metadata(
        &self,
        ctx: &CallContext,
        req: &GetMetadataRequest,
    ) -> SrepResult<Metadata> {
        self.call(ctx, Method::GET, "/metadata", req).await
    }

    /// Connection target for a play's shell.
    pub fn shell_target(&self, req: &GetShellRequest) -> SrepResult<ShellTarget> {
        req.validate()?;
        ShellTarget::new(
            &self.options.scheme,
            &self.options.url,
            &req.id,
            &self.options.token,
            req.rows,
            req.cols,
        )
    }

    /// One attempt at opening a play's shell socket, abandoned when `ctx`
    /// is done.
    ///
    /// Fails with [`SrepError::TooEarly`] while the play is still starting;
    /// wrap in [`crate::retry`] to wait for it.
    pub async fn connect_shell(
        &self,
        ctx: &CallContext,
        req: &GetShellRequest,
    ) -> SrepResult<MessageChannel<WsStream>> {
        let target = self.shell_target(req)?;
        until_done(ctx, transport::connect(&target)).await
    }

    /// Open a play's shell and relay it until it ends.
    ///
    /// If the connection cannot be established, no relay task is started.
    pub async fn shell<I, O, T>(
        &self,
        ctx: &CallContext,
        req: &GetShellRequest,
        input: I,
        output: O,
        size: T,
        opts: &ShellOptions,
    ) -> SrepResult<ShellOutcome>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        T: TerminalSize,
    {
        debug!(id = %req.id, "connecting to shell");
        let channel = self.connect_shell(ctx, req).await?;
        relay::run(channel, input, output, size, opts, ctx).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}://{}{}", self.options.scheme, self.options.url, path)
    }

    async fn call<Req, Resp>(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        req: &Req,
    ) -> SrepResult<Resp>
    where
        Req: Serialize + Validate,
        Resp: DeserializeOwned + Default,
    {
        req.validate()?;

        let mut builder = self
            .http
            .request(method.clone(), self.endpoint(path))
            .header(ACCEPT, "application/json");
        if method != Method::GET {
            builder = builder.json(req);
        }
        if !self.options.token.is_empty() {
            builder = builder.bearer_auth(&self.options.token);
        }

        debug!(%method, path, "api request");
        until_done(ctx, async {
            let resp = builder
                .send()
                .await
                .map_err(|e| SrepError::Transport(format!("request to {path} failed: {e}")))?;
            let status = resp.status().as_u16();
            if status > 299 {
                debug!(%method, path, status, "api error");
                return Err(SrepError::Http { status });
            }
            let body = resp
                .bytes()
                .await
                .map_err(|e| SrepError::Transport(format!("reading {path} response failed: {e}")))?;
            if body.is_empty() {
                return Ok(Resp::default());
            }
            Ok(serde_json::from_slice(&body)?)
        })
        .await
    }
}

/// Run `fut` unless `ctx` is cancelled or expires first.
async fn until_done<T>(ctx: &CallContext, fut: impl Future<Output = SrepResult<T>>) -> SrepResult<T> {
    tokio::select! {
        biased;
        interrupted = ctx.done() => Err(interrupted.into()),
        result = fut => result,
    }
}
