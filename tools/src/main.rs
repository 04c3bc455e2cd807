//! save-inspector: headless inspection of a game's save directory.
//!
//! Usage:
//!   save-inspector list [--json]
//!   save-inspector show Save003
//!   save-inspector dump Save003 data
//!   save-inspector purge --yes
//!
//! Flags:
//!   --config <file>   SaveConfig JSON (defaults apply when omitted)
//!   --root <dir>      override the data root from the config

use anyhow::{bail, Context, Result};
use nightshade_core::{
    codec,
    reader::{SaveDirectoryReader, SaveSummary},
    storage, SaveConfig,
};
use std::env;

#[derive(serde::Serialize)]
struct SaveRow {
    folder:      String,
    id:          String,
    scene:       String,
    saved_at:    Option<String>,
    time_played: f64,
    save_type:   Option<&'static str>,
    autosave:    bool,
}

impl From<&SaveSummary> for SaveRow {
    fn from(s: &SaveSummary) -> Self {
        Self {
            folder:      s.folder_name.clone(),
            id:          s.id.clone(),
            scene:       s.scene.clone(),
            saved_at:    s.date_time.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
            time_played: s.time_played,
            save_type:   s.save_type.map(|t| t.as_str()),
            autosave:    s.is_autosave,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = load_config(&args)?;
    let reader = SaveDirectoryReader::new(config)?;

    let positional: Vec<&str> = positional_args(&args);
    match positional.as_slice() {
        ["list"] => list(&reader, args.iter().any(|a| a == "--json")),
        ["show", folder] => show(&reader, folder),
        ["dump", folder] => dump(&reader, folder, "info"),
        ["dump", folder, which] => dump(&reader, folder, which),
        ["purge"] => purge(&reader, args.iter().any(|a| a == "--yes")),
        _ => {
            eprintln!("usage: save-inspector [--config FILE] [--root DIR] <list|show|dump|purge> ...");
            std::process::exit(2);
        }
    }
}

fn load_config(args: &[String]) -> Result<SaveConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => SaveConfig::load(path)?,
        None => SaveConfig::default(),
    };
    if let Some(root) = flag_value(args, "--root") {
        config.data_root = root.into();
    }
    log::debug!("inspector: saves root {}", config.saves_root().display());
    Ok(config)
}

fn list(reader: &SaveDirectoryReader, json: bool) -> Result<()> {
    let saves = reader.read_saves_meta()?;
    if json {
        let rows: Vec<SaveRow> = saves.iter().map(SaveRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if saves.is_empty() {
        println!("  (no saves under {})", reader.config().saves_root().display());
        return Ok(());
    }
    println!("{:<16} {:<20} {:<20} {:>10}  {}", "FOLDER", "SCENE", "SAVED AT", "PLAYED", "TYPE");
    for save in &saves {
        let row = SaveRow::from(save);
        println!(
            "{:<16} {:<20} {:<20} {:>10}  {}",
            row.folder,
            row.scene,
            row.saved_at.unwrap_or_default(),
            format_played(row.time_played),
            row.save_type.unwrap_or("?"),
        );
    }
    Ok(())
}

fn show(reader: &SaveDirectoryReader, folder: &str) -> Result<()> {
    let summary = reader.read_save(folder)?;
    if summary.is_empty() {
        bail!("no readable save in folder {folder}");
    }
    let row = SaveRow::from(&summary);

    println!("=== {folder} ===");
    println!("  id:          {}", row.id);
    println!("  scene:       {}", row.scene);
    println!("  saved at:    {}", row.saved_at.unwrap_or_default());
    println!("  played:      {}", format_played(row.time_played));
    println!("  type:        {}", row.save_type.unwrap_or("?"));
    match &summary.thumbnail {
        Some(image) => println!("  thumbnail:   {}x{}", image.width(), image.height()),
        None => println!("  thumbnail:   none"),
    }
    match reader.read_save_pair(folder) {
        Ok((_, data)) => println!(
            "  contents:    {} world, {} runtime saveables",
            data.world_saveables.len(),
            data.runtime_saveables.len()
        ),
        Err(e) => println!("  contents:    UNLOADABLE ({e})"),
    }
    Ok(())
}

fn dump(reader: &SaveDirectoryReader, folder: &str, which: &str) -> Result<()> {
    let config = reader.config();
    let file = match which {
        "info" => config.info_file_name(),
        "data" => config.data_file_name(),
        other => bail!("unknown document '{other}', expected info or data"),
    };
    let path = config.save_folder(folder).join(file);
    let doc = storage::read_document(&path, reader.encryptor())
        .with_context(|| format!("reading {}", path.display()))?;
    println!("{}", codec::serialize(&doc)?);
    Ok(())
}

fn purge(reader: &SaveDirectoryReader, confirmed: bool) -> Result<()> {
    let count = reader.count_save_folders()?;
    if !confirmed {
        println!("would remove {count} save folders; pass --yes to delete them");
        return Ok(());
    }
    reader.remove_all_saves()?;
    println!("removed {count} save folders");
    Ok(())
}

fn format_played(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        match arg.as_str() {
            "--config" | "--root" => skip_next = true,
            a if a.starts_with("--") => {}
            a => out.push(a),
        }
    }
    out
}
