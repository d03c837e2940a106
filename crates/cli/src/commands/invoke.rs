use clap::{Args, ValueEnum};
use courier_core::{
    config::AppConfig,
    types::{Header, Payload},
    EndpointDescriptor, EngineBuilder, InvocationRequest, Protocol, ProtocolHint,
};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::utils::{CliError, CliResult};

/// Flags shared by every invocation command.
#[derive(Args, Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Use the long timeout tier
    #[arg(long)]
    pub long: bool,

    /// Print the raw response text instead of the normalized document
    #[arg(long)]
    pub verbatim: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcVersionArg {
    V1,
    V2,
}

impl RpcVersionArg {
    fn protocol(self) -> Protocol {
        match self {
            Self::V1 => Protocol::RpcV1,
            Self::V2 => Protocol::RpcV2,
        }
    }

    fn hint(self) -> ProtocolHint {
        match self {
            Self::V1 => ProtocolHint::RpcV1,
            Self::V2 => ProtocolHint::RpcV2,
        }
    }
}

/// One invocation ready to send.
#[derive(Debug)]
pub struct Invocation {
    pub url: String,
    pub hint: ProtocolHint,
    pub request: InvocationRequest,
    pub verbatim: bool,
}

impl Invocation {
    pub fn get(
        url: String,
        params: &[String],
        cache: bool,
        options: &InvokeOptions,
    ) -> CliResult<Self> {
        let body = if params.is_empty() {
            Payload::Empty
        } else {
            Payload::document(Value::Object(parse_params(params)?))
        };
        let request = with_options(InvocationRequest::get().body(body).use_cache(cache), options)?;
        Ok(Self { url, hint: ProtocolHint::PlainHttp, request, verbatim: options.verbatim })
    }

    pub fn post(
        url: String,
        body: Option<String>,
        json: Option<String>,
        options: &InvokeOptions,
    ) -> CliResult<Self> {
        let body = match (body, json) {
            (Some(_), Some(_)) => {
                return Err(CliError::Usage("--body and --json are mutually exclusive".to_string()))
            }
            (Some(text), None) => Payload::text(text),
            (None, Some(json)) => Payload::document(serde_json::from_str(&json)?),
            (None, None) => Payload::Empty,
        };
        let request = with_options(InvocationRequest::post().body(body), options)?;
        Ok(Self { url, hint: ProtocolHint::PlainHttp, request, verbatim: options.verbatim })
    }

    pub fn rpc(
        url: String,
        version: RpcVersionArg,
        json: &str,
        options: &InvokeOptions,
    ) -> CliResult<Self> {
        let body = Payload::document(serde_json::from_str(json)?);
        let request = with_options(InvocationRequest::new(version.protocol()).body(body), options)?;
        Ok(Self { url, hint: version.hint(), request, verbatim: options.verbatim })
    }
}

fn with_options(
    request: InvocationRequest,
    options: &InvokeOptions,
) -> CliResult<InvocationRequest> {
    let mut request = request.use_short_timeout(!options.long);
    for line in &options.headers {
        let header = Header::parse(line).ok_or_else(|| {
            CliError::Usage(format!("Malformed header '{line}', expected 'Name: value'"))
        })?;
        request = request.header(header.name, header.value);
    }
    Ok(request)
}

/// Parses `key=value` pairs; repeated keys collect into an array.
pub fn parse_params(params: &[String]) -> CliResult<Map<String, Value>> {
    let mut map = Map::new();
    for param in params {
        let (key, value) = param.split_once('=').ok_or_else(|| {
            CliError::Usage(format!("Malformed parameter '{param}', expected key=value"))
        })?;
        let value = Value::String(value.to_string());

        match map.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.to_string(), value);
            }
        }
    }
    Ok(map)
}

/// Builds an engine, sends the invocation and prints the result.
///
/// Ctrl-C cancels the in-flight invocation.
pub async fn run_invocation(config: &AppConfig, invocation: Invocation) -> CliResult<()> {
    let engine = EngineBuilder::from_config(config).build()?;
    let endpoint = EndpointDescriptor::new(&invocation.url, invocation.hint)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling invocation");
            on_interrupt.cancel();
        }
    });

    let result = engine.invoke(&endpoint, invocation.request, &cancel).await?;

    if result.served_from_cache {
        tracing::info!("served from cache");
    }

    if invocation.verbatim {
        println!("{}", result.verbatim_payload);
    } else {
        println!("{}", serde_json::to_string_pretty(&result.payload)?);
    }

    Ok(())
}
