use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use std::path::{Path, PathBuf};

use steam_shortcuts::app_list::{validate_steam_id, SteamApi};
use steam_shortcuts::args::Args;
use steam_shortcuts::config::{self, Env, Settings};
use steam_shortcuts::game_files::{create_steam_appid_file, find_ini_file, update_ini_file};
use steam_shortcuts::steam::{self, Options};
use steam_shortcuts::vdf::Shortcut;
use steam_shortcuts::{icon, process, Error};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "steam_shortcuts=debug"
    } else {
        "steam_shortcuts=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn list_all(root: &Path) -> Result<()> {
    for (user_id, entries) in steam::list_all_users(root)? {
        println!("User {}: ", user_id);
        let entries = match entries {
            Ok(entries) => entries,
            Err(e) => {
                println!("  error: {}", e);
                continue;
            }
        };
        for entry in entries {
            println!(
                "  [{}] {} -> {}",
                entry.key,
                entry.text("AppName").unwrap_or_default(),
                entry.text("Exe").unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn default_start_dir(exe: &str) -> String {
    Path::new(exe)
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sync_game_files(
    game_dir: &Path,
    name: &str,
    steam_id: Option<&str>,
    app_id: Option<u32>,
    lookup: bool,
    env: &Env,
) -> Result<()> {
    if let Some(steam_id) = steam_id {
        match find_ini_file(game_dir) {
            Some(ini_file) => {
                update_ini_file(&ini_file, steam_id)?;
            }
            None => println!("INI file not found in {}", game_dir.display()),
        }
    }

    let app_id = match app_id {
        Some(app_id) => Some(app_id),
        None if lookup => SteamApi::new(env.app_list_url.as_str())
            .with_api_key(env.api_key.clone())
            .find_app_id(name)?,
        None => None,
    };
    match app_id {
        Some(app_id) => {
            let path = create_steam_appid_file(game_dir, app_id)?;
            println!("Wrote app ID {} to {}", app_id, path.display());
        }
        None if lookup => println!("No app ID found for {}", name),
        None => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Args = Args::parse();

    // load environment variables from .env file
    dotenv().ok();
    init_tracing(args.verbose);

    let env = Env::from_env();
    let settings_path = config::settings_path();
    let mut settings = Settings::load(&settings_path)?;

    let steam_path: Option<PathBuf> = args
        .steam_path
        .clone()
        .or_else(|| env.steam_path.clone())
        .or_else(|| settings.steam_path.clone());
    let candidates = match &steam_path {
        Some(path) => vec![path.clone()],
        None => steam::default_install_candidates(),
    };
    let root = steam::locate_installation(&candidates)?;

    if args.list {
        return list_all(&root);
    }

    let name = args.name.clone().ok_or("--name is required")?;
    let exe = args.exe.clone().ok_or("--exe is required")?;

    let steam_id = args.steam_id.clone().or_else(|| settings.steam_id.clone());
    if let Some(steam_id) = &steam_id {
        if !validate_steam_id(steam_id) {
            return Err(Error::InvalidSteamId(steam_id.clone()).into());
        }
    }

    process::ensure_stopped(args.close_steam, args.skip_steam_check)?;

    let mut icon = args.icon.clone();
    if icon.is_empty() && args.extract_icon {
        if let Some(path) = icon::extract_icon(Path::new(&exe))? {
            icon = path.to_string_lossy().into_owned();
        }
    }

    let start_dir = args
        .start_dir
        .clone()
        .unwrap_or_else(|| default_start_dir(&exe));
    let shortcut = Shortcut::new(name.as_str(), exe.as_str(), start_dir)
        .with_icon(icon)
        .with_shortcut_path(args.shortcut_path.as_str());
    let options = Options {
        policy: args.index_policy.unwrap_or(settings.index_policy),
        backup: settings.backup && !args.no_backup,
    };

    let reports = steam::add_to_all_users(&root, &shortcut, &options)?;
    for report in &reports {
        println!("{}", report);
    }

    if let Some(game_dir) = &args.game_dir {
        sync_game_files(
            game_dir,
            &name,
            steam_id.as_deref(),
            args.app_id,
            args.lookup_app_id,
            &env,
        )?;
    }

    if args.save {
        settings.steam_path = Some(root.clone());
        settings.steam_id = steam_id;
        settings.save(&settings_path)?;
    }

    if args.open_steam {
        process::open(&process::launcher_candidates(Some(&root)))?;
    }

    let failed = reports.iter().filter(|report| report.is_failure()).count();
    if failed > 0 {
        warn!("{} of {} user stores were not updated", failed, reports.len());
        return Err(format!("{} of {} user stores failed", failed, reports.len()).into());
    }
    info!("Non-Steam game '{}' registered.", name);
    Ok(())
}
