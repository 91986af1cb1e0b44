use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use scene_map::{CookedScene, SceneMap, SceneMapError};
use scene_runtime::Session;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_SCENE_LOAD: i32 = 10;
const EXIT_SCENE_INVALID: i32 = 20;

#[derive(Parser)]
#[command(name = "tools", version, about = "Scene tools CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a scene file.
    Validate(ValidateArgs),
    /// Run a headless scripted session against a scene.
    Smoke(SmokeArgs),
}

#[derive(Parser)]
struct ValidateArgs {
    #[arg(long, value_name = "PATH")]
    scene: PathBuf,
}

#[derive(Parser)]
struct SmokeArgs {
    #[arg(long, value_name = "PATH")]
    scene: PathBuf,

    #[arg(long, default_value_t = 120)]
    ticks: u32,

    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Comma-separated keys held for the whole run, e.g. `d,w`.
    #[arg(long, value_delimiter = ',')]
    hold: Vec<String>,

    /// Click at a pixel position on a given tick, `X,Y@TICK`. Repeatable.
    #[arg(long, value_parser = parse_click)]
    click: Vec<ScriptedClick>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ScriptedClick {
    pixel: [f32; 2],
    tick: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Validate(args) => run_validate(&args.scene),
        Commands::Smoke(args) => run_smoke(args),
    };
    std::process::exit(exit_code);
}

fn run_validate(path: &Path) -> i32 {
    let map = match load_scene(path) {
        Ok(map) => map,
        Err(code) => return code,
    };
    let validation = map.validate();
    for warning in &validation.warnings {
        println!("warning: {}", warning);
    }
    for error in &validation.errors {
        println!("error: {}", error);
    }
    if !validation.is_ok() {
        eprintln!(
            "scene '{}' is invalid ({} errors)",
            map.name,
            validation.errors.len()
        );
        return EXIT_SCENE_INVALID;
    }
    println!(
        "scene '{}' ok ({} terrain, {} hotspots, {} primitives, {} warnings)",
        map.name,
        map.terrain.len(),
        map.hotspots.len(),
        map.primitives.len(),
        validation.warnings.len()
    );
    EXIT_SUCCESS
}

fn run_smoke(args: SmokeArgs) -> i32 {
    if !(args.dt.is_finite() && args.dt > 0.0) {
        eprintln!("--dt must be > 0");
        return EXIT_USAGE;
    }
    let map = match load_scene(&args.scene) {
        Ok(map) => map,
        Err(code) => return code,
    };
    let cooked = match cook_scene(&map) {
        Ok(cooked) => cooked,
        Err(code) => return code,
    };

    let mut session = Session::with_character(cooked);
    for key in &args.hold {
        session.key_down(key.trim());
    }
    let mut last_hover = None;
    for tick in 0..args.ticks {
        for click in args.click.iter().filter(|click| click.tick == tick) {
            session.click(click.pixel);
        }
        let report = session.frame(args.dt);
        for action in &report.clicks {
            log::info!("tick {}: click -> {:?}", tick, action);
        }
        last_hover = report.hover;
    }

    let stats = session.stats();
    println!("smoke '{}' ok (ticks={}, dt={:.4})", session.name(), args.ticks, args.dt);
    match session.character() {
        Some(character) => println!(
            "character: pos=({:.3}, {:.3}, {:.3}) grounded={} facing={:.3}",
            character.position.x,
            character.position.y,
            character.position.z,
            character.grounded,
            character.facing
        ),
        None => println!("character: not spawned"),
    }
    println!(
        "hops={} landings={} respawns={} bounces={} panels_opened={} ignored_clicks={}",
        session.controller().hop_count(),
        stats.landings,
        stats.respawns,
        stats.bounces,
        stats.panels_opened,
        stats.ignored_clicks
    );
    println!("hover: {}", last_hover.as_deref().unwrap_or("none"));
    println!("panel: {}", session.gate().open_for().unwrap_or("closed"));
    EXIT_SUCCESS
}

fn load_scene(path: &Path) -> Result<SceneMap, i32> {
    match SceneMap::load(path) {
        Ok(map) => Ok(map),
        Err(err) => {
            eprintln!("scene load failed ({}): {}", path.display(), err);
            Err(EXIT_SCENE_LOAD)
        }
    }
}

fn cook_scene(map: &SceneMap) -> Result<CookedScene, i32> {
    match map.cook() {
        Ok(cooked) => Ok(cooked),
        Err(SceneMapError::Invalid(errors)) => {
            for error in &errors {
                eprintln!("error: {}", error);
            }
            Err(EXIT_SCENE_INVALID)
        }
        Err(err) => {
            eprintln!("scene cook failed: {}", err);
            Err(EXIT_SCENE_INVALID)
        }
    }
}

fn parse_click(value: &str) -> Result<ScriptedClick, String> {
    let (position, tick) = value
        .split_once('@')
        .ok_or_else(|| format!("expected X,Y@TICK, got `{value}`"))?;
    let (x, y) = position
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y before `@`, got `{position}`"))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("bad x `{x}`"))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("bad y `{y}`"))?;
    let tick: u32 = tick.trim().parse().map_err(|_| format!("bad tick `{tick}`"))?;
    Ok(ScriptedClick {
        pixel: [x, y],
        tick,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_scripts_parse() {
        assert_eq!(
            parse_click("640,360@12"),
            Ok(ScriptedClick {
                pixel: [640.0, 360.0],
                tick: 12,
            })
        );
        assert!(parse_click("640,360").is_err());
        assert!(parse_click("640@3").is_err());
        assert!(parse_click("a,b@1").is_err());
    }

    #[test]
    fn cli_accepts_smoke_arguments() {
        let cli = Cli::try_parse_from([
            "tools", "smoke", "--scene", "scenes/portfolio.toml", "--ticks", "10", "--hold", "d,w",
            "--click", "10,20@3",
        ])
        .expect("parse");
        match cli.command {
            Commands::Smoke(args) => {
                assert_eq!(args.ticks, 10);
                assert_eq!(args.hold, vec!["d".to_string(), "w".to_string()]);
                assert_eq!(args.click.len(), 1);
            }
            Commands::Validate(_) => panic!("expected smoke"),
        }
    }
}
