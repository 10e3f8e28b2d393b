use std::path::PathBuf;

use clap::Parser;

use crate::vdf::IndexPolicy;

#[derive(Parser, Debug)]
#[command(version, about = "Add a non-Steam game to every local Steam user", long_about = None)]
pub struct Args {
    /// Name shown in the Steam library
    #[arg(long, required_unless_present = "list")]
    pub name: Option<String>,

    /// Path to the game executable
    #[arg(long, required_unless_present = "list")]
    pub exe: Option<String>,

    /// Working directory (defaults to the executable's directory)
    #[arg(long)]
    pub start_dir: Option<String>,

    /// Icon path
    #[arg(long, default_value = "")]
    pub icon: String,

    /// Extract the executable's icon to icon.ico when --icon is not given
    #[arg(long)]
    pub extract_icon: bool,

    /// Shortcut path
    #[arg(long, default_value = "")]
    pub shortcut_path: String,

    /// Steam installation directory
    #[arg(long)]
    pub steam_path: Option<PathBuf>,

    /// How the index of the new entry is chosen
    #[arg(long, value_enum)]
    pub index_policy: Option<IndexPolicy>,

    /// Do not keep a .bak copy of modified shortcut files
    #[arg(long)]
    pub no_backup: bool,

    /// Close Steam if it is running
    #[arg(long)]
    pub close_steam: bool,

    /// Do not check whether Steam is running
    #[arg(long)]
    pub skip_steam_check: bool,

    /// Start Steam when done
    #[arg(long)]
    pub open_steam: bool,

    /// List the shortcuts of every user and exit
    #[arg(long)]
    pub list: bool,

    /// Game directory holding the .ini settings file
    #[arg(long)]
    pub game_dir: Option<PathBuf>,

    /// SteamID64 written to the game's .ini file
    #[arg(long)]
    pub steam_id: Option<String>,

    /// Steam app ID written to steam_appid.txt
    #[arg(long)]
    pub app_id: Option<u32>,

    /// Look the app ID up by game name using the Steam Web API
    #[arg(long, conflicts_with = "app_id")]
    pub lookup_app_id: bool,

    /// Remember the Steam path and Steam ID for later runs
    #[arg(long)]
    pub save: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
