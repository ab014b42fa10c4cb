//! kremap_sim: replays a textual event script (§8 notation: `+K` press, `-K`
//! release, `Nms` timer delay) against a compiled rule set and prints the
//! resulting output stream, grounded in the teacher pack's own
//! simulated-input driver shape (`jtroo-kanata/simulated_input`).

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::Parser;

use kremap_core::domain::repositories::ConfigRepository;
use kremap_core::domain::RuleSetAggregate;
use kremap_core::{Key, KeyEvent, KeyState};
use kremap_runtime::{FileConfigRepository, RecordingOutput, ServerLoop, VirtualClock};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replays a key-event script against a compiled kremap rule set")]
struct Args {
    /// Directory holding compiled `<name>.kremaprs` rule-set files, written
    /// by `kremap_runtime::config_repo::encode_rule_set`.
    #[arg(short = 'c', long, required_unless_present = "demo")]
    config_dir: Option<PathBuf>,

    /// Rule-set name (without the `.kremaprs` extension) to load from `config_dir`.
    #[arg(short = 'n', long, default_value = "default")]
    name: String,

    /// Skip loading a rule set and use a single built-in `+1 >> +2` remap,
    /// for smoke-testing the binary without a compiled config on hand.
    #[arg(long)]
    demo: bool,

    /// Event script to replay: whitespace- and newline-separated tokens,
    /// `+N` (press physical key N), `-N` (release), or `Nms` (advance the
    /// clock by N ms, firing any pending timer whose threshold has passed).
    /// Lines starting with `#` are comments.
    script: PathBuf,
}

fn build_demo_rule_set() -> RuleSetAggregate {
    let a = Key::physical(1);
    let b = Key::physical(2);
    let ctx = kremap_core::testing::single_rule_context(&kremap_core::testing::tap(a), &kremap_core::testing::tap(b));
    RuleSetAggregate::build(vec![vec![ctx]], vec![]).expect("demo rule set is always valid")
}

fn load_rule_set(args: &Args) -> Result<RuleSetAggregate> {
    if args.demo {
        return Ok(build_demo_rule_set());
    }
    let config_dir = args.config_dir.as_ref().expect("clap enforces config_dir without --demo");
    let repo = FileConfigRepository::new(config_dir);
    let compiled = repo
        .load(&args.name)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("loading rule set {:?} from {config_dir:?}", args.name))?;
    RuleSetAggregate::build(compiled.stages, compiled.exit_sequence).map_err(|e| anyhow::anyhow!("rule set failed to validate: {e}"))
}

fn total_context_count(server: &ServerLoop<VirtualClock, RecordingOutput>) -> usize {
    server.rule_set().multistage().stages().iter().map(|s| s.contexts().len()).sum()
}

fn run_token(server: &mut ServerLoop<VirtualClock, RecordingOutput>, token: &str) -> Result<()> {
    if let Some(rest) = token.strip_prefix('+') {
        let id: u16 = rest.parse().with_context(|| format!("invalid key id in {token:?}"))?;
        server.handle_event(KeyEvent::new(Key::physical(id), KeyState::Down), None);
    } else if let Some(rest) = token.strip_prefix('-') {
        let id: u16 = rest.parse().with_context(|| format!("invalid key id in {token:?}"))?;
        server.handle_event(KeyEvent::new(Key::physical(id), KeyState::Up), None);
    } else if let Some(digits) = token.strip_suffix("ms") {
        let ms: u64 = digits.parse().with_context(|| format!("invalid delay in {token:?}"))?;
        server.clock_mut().advance(ms);
        server.poll_timer();
    } else {
        bail!("unrecognized token {token:?} (expected +N, -N, or Nms)");
    }
    Ok(())
}

fn format_event(event: KeyEvent) -> String {
    match event.state {
        KeyState::Down => format!("+{}", event.key.0),
        KeyState::Up => format!("-{}", event.key.0),
        other => format!("{other:?}({})", event.key.0),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let aggregate = load_rule_set(&args)?;
    let script = fs::read_to_string(&args.script).with_context(|| format!("reading {:?}", args.script))?;

    let mut server = ServerLoop::new(aggregate, VirtualClock::new(), RecordingOutput::new());
    let all_contexts: Vec<usize> = (0..total_context_count(&server)).collect();
    let activation = server.rule_set_mut().multistage_mut().set_active_client_contexts(&all_contexts);
    log::debug!("activation produced {} context-transition event(s)", activation.len());

    for (line_no, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split_whitespace() {
            run_token(&mut server, token).with_context(|| format!("line {}", line_no + 1))?;
        }
    }

    for event in server.output().sent() {
        println!("{}", format_event(*event));
    }
    if server.should_exit() {
        println!("# exit gesture matched");
    }

    Ok(())
}
