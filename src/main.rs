use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use request_context::{make_context, RequestScope, ScopeSnapshot};

/// Simulate a few requests reading and writing one context value.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Diagnostic name of the context
    #[arg(long, default_value = "userId")]
    name: String,
    /// Value to set in the first request (JSON, or a plain string)
    #[arg(long, default_value = "42")]
    value: String,
    /// Number of simulated requests
    #[arg(long, default_value_t = 2)]
    requests: usize,
    /// Never set the value
    #[arg(long)]
    skip_set: bool,
    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize, Debug)]
struct RequestReport {
    request: usize,
    before: Outcome,
    after: Outcome,
    snapshot: ScopeSnapshot,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Value(Value),
    Error(String),
}

/// Parse `raw` as JSON, accepting bare words as strings.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Run `args.requests` passes, each in its own fresh scope.
fn simulate(args: &Args) -> Vec<RequestReport> {
    let value = parse_value(&args.value);
    let (get, set) = make_context::<Value>(args.name.as_str());

    let read = |scope: &RequestScope| match get.get_cloned(scope) {
        Ok(v) => Outcome::Value(v),
        Err(e) => Outcome::Error(e.to_string()),
    };

    (1..=args.requests)
        .map(|request| {
            RequestScope::run(|scope| {
                let before = read(scope);
                if request == 1 && !args.skip_set {
                    set.set(scope, value.clone());
                }
                RequestReport {
                    request,
                    before,
                    after: read(scope),
                    snapshot: scope.snapshot(),
                }
            })
        })
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let reports = simulate(&args);

    let out = if args.pretty {
        serde_json::to_string_pretty(&reports)
    } else {
        serde_json::to_string(&reports)
    };
    match out {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Failed to encode report: {e}");
            std::process::exit(1);
        }
    }
}
