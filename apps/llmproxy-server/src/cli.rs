//! Dispatches between the proxy itself and the mock-upstream test fixture.
//! `Settings` already owns the full `serve` flag surface (see
//! `llmproxy_common::Settings`), so this only needs to recognize the
//! `serve-mock-upstream` subcommand and otherwise hand the rest of argv to
//! `Settings::parse_from` — stripping a leading `serve` token if present,
//! since `serve` is the implicit default.

use clap::Parser;
use llmproxy_common::Settings;

pub(crate) enum Command {
    Serve(Settings),
    ServeMockUpstream { host: String, port: u16 },
}

#[derive(Parser)]
#[command(name = "llmproxy-server serve-mock-upstream")]
struct MockUpstreamArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8788)]
    port: u16,
}

pub(crate) fn parse() -> Command {
    let mut args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("serve-mock-upstream") {
        let rest = args.split_off(2);
        let mock = MockUpstreamArgs::parse_from(std::iter::once(args[0].clone()).chain(rest));
        return Command::ServeMockUpstream { host: mock.host, port: mock.port };
    }

    if args.get(1).map(String::as_str) == Some("serve") {
        args.remove(1);
    }

    Command::Serve(Settings::parse_from(args))
}
