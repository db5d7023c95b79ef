use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use tse_core::{SaveCodec, parse_dotted};

#[derive(Parser, Debug)]
#[command(
    name = "tse-cli",
    about = "Inspect and edit tagged property-tree game saves via an external codec",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode a save (or load a JSON dump) and print the tree
    Dump(FileArgs),
    /// Get the value at a dotted path (digit segments index into arrays)
    Get(GetArgs),
    /// Set a raw JSON value at a dotted path; prints or writes with --out
    Set(SetArgs),
    /// Discover entities and print name/state/progress
    Entities(FileArgs),
    /// Export discovered entities to a reusable JSON record file
    Export(ExportArgs),
    /// Import an exported record file and reconcile it into the save tree
    Import(ImportArgs),
    /// Merge an edited JSON tree onto a fresh baseline and encode a .sav
    Save(SaveArgs),
    /// Bulk edits with dry-run support
    Cheat(CheatArgs),
    /// Zip-backup a save file or directory
    Backup(BackupArgs),
}

#[derive(ClapArgs, Debug)]
struct FileArgs {
    /// Save file (.sav via codec, or a .json dump)
    path: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct GetArgs {
    path: PathBuf,
    /// Dotted path, e.g. root.properties.QuestSaveData_0
    #[arg(long)]
    at: String,
}

#[derive(ClapArgs, Debug)]
struct SetArgs {
    path: PathBuf,
    #[arg(long)]
    at: String,
    /// New value as raw JSON (e.g. 123, true, "str")
    #[arg(long)]
    value: String,
    /// Output .json path; otherwise prints to stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct ExportArgs {
    path: PathBuf,
    /// Destination record file
    #[arg(long, default_value = "entity_export.json")]
    out: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct ImportArgs {
    path: PathBuf,
    /// Previously exported record file
    #[arg(long)]
    records: PathBuf,
    /// Append template-cloned entities for names the save lacks
    #[arg(long, default_value_t = true)]
    add_missing: bool,
    /// Output .json path for the updated tree; otherwise prints a summary only
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct SaveArgs {
    /// Edited tree as JSON (from dump/import --out)
    #[arg(long, value_name = "JSON")]
    input: PathBuf,
    /// Source .sav to fetch the fresh baseline from
    #[arg(long, value_name = "SAV")]
    src: PathBuf,
    /// Output .sav path
    #[arg(long, value_name = "SAV")]
    output: PathBuf,
    /// Zip-backup the output location first
    #[arg(long, default_value_t = false)]
    backup: bool,
}

#[derive(ClapArgs, Debug)]
struct CheatArgs {
    path: PathBuf,
    #[arg(value_enum)]
    which: CheatKind,
    /// Count changes without applying them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Output .json path for the updated tree
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CheatKind {
    Godmode,
    Stats,
    Currency,
    Locations,
    Achievements,
}

#[derive(ClapArgs, Debug)]
struct BackupArgs {
    path: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().cmd {
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Get(a) => cmd_get(a),
        Cmd::Set(a) => cmd_set(a),
        Cmd::Entities(a) => cmd_entities(a),
        Cmd::Export(a) => cmd_export(a),
        Cmd::Import(a) => cmd_import(a),
        Cmd::Save(a) => cmd_save(a),
        Cmd::Cheat(a) => cmd_cheat(a),
        Cmd::Backup(a) => cmd_backup(a),
    }
}

fn load_tree(path: &PathBuf) -> serde_json::Value {
    SaveCodec::locate().load_file(path).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    })
}

fn emit_tree(tree: &serde_json::Value, out: Option<PathBuf>) {
    match out {
        Some(p) => {
            let text = serde_json::to_string_pretty(tree).expect("tree serializes");
            if let Err(e) = std::fs::write(&p, text) {
                eprintln!("error writing {}: {}", p.display(), e);
                std::process::exit(5);
            }
        }
        None => println!("{}", serde_json::to_string_pretty(tree).expect("tree serializes")),
    }
}

fn cmd_dump(args: FileArgs) {
    let tree = load_tree(&args.path);
    println!("{}", serde_json::to_string_pretty(&tree).expect("tree serializes"));
}

fn cmd_get(args: GetArgs) {
    let tree = load_tree(&args.path);
    match tse_core::get(&tree, &parse_dotted(&args.at)) {
        Some(v) => println!("{}", serde_json::to_string_pretty(v).expect("tree serializes")),
        None => {
            eprintln!("not found: {}", args.at);
            std::process::exit(3);
        }
    }
}

fn cmd_set(args: SetArgs) {
    let mut tree = load_tree(&args.path);
    let new_val: serde_json::Value = serde_json::from_str(&args.value).unwrap_or_else(|e| {
        eprintln!("invalid --value JSON: {}", e);
        std::process::exit(3);
    });
    if !tse_core::set(&mut tree, &parse_dotted(&args.at), new_val) {
        eprintln!("path did not resolve: {}", args.at);
        std::process::exit(4);
    }
    emit_tree(&tree, args.out);
}

fn cmd_entities(args: FileArgs) {
    let tree = load_tree(&args.path);
    let (rows, report) = tse_core::discover_entities(&tree);
    if let Some(r) = report {
        eprintln!("# {} ({}) -> {} entities", r.list_path, r.strategy, r.count);
    }
    for row in rows {
        println!("{}\t{}\t{} progress", row.name, row.state, row.progress_objects.len());
    }
}

fn cmd_export(args: ExportArgs) {
    let tree = load_tree(&args.path);
    let (rows, _) = tse_core::discover_entities(&tree);
    if rows.is_empty() {
        eprintln!("no entities discovered");
        std::process::exit(3);
    }
    let payload = tse_core::export_payload(&rows);
    if let Err(e) = tse_core::write_export(&args.out, &payload) {
        eprintln!("error: {}", e);
        std::process::exit(5);
    }
    println!("exported {} rows to {}", payload.rows.len(), args.out.display());
}

fn cmd_import(args: ImportArgs) {
    let mut tree = load_tree(&args.path);
    let payload = tse_core::read_export(&args.records).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    let (rows_touched, progress_set) = tse_core::reconcile(&mut tree, &payload.rows, args.add_missing);
    println!("rows updated: {}  progress values set: {}", rows_touched, progress_set);
    if let Some(out) = args.out {
        emit_tree(&tree, Some(out));
    }
}

fn cmd_save(args: SaveArgs) {
    let edited = {
        let data = std::fs::read_to_string(&args.input).unwrap_or_else(|e| {
            eprintln!("error reading JSON: {}", e);
            std::process::exit(2);
        });
        serde_json::from_str(&data).unwrap_or_else(|e| {
            eprintln!("invalid JSON: {}", e);
            std::process::exit(3);
        })
    };
    if args.backup && args.output.exists() {
        match tse_core::backup::zip_backup(&args.output) {
            Ok(p) => eprintln!("backup: {}", p.display()),
            Err(e) => {
                eprintln!("backup failed: {}", e);
                std::process::exit(5);
            }
        }
    }
    let codec = SaveCodec::locate();
    let res = codec.save_sav(&args.output, &edited, &args.src, |pct, msg| {
        eprintln!("[{:>3}%] {}", pct, msg);
    });
    match res {
        Ok(p) => println!("saved: {}", p.display()),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(4);
        }
    }
}

fn cmd_cheat(args: CheatArgs) {
    let mut tree = load_tree(&args.path);
    let changed = match args.which {
        CheatKind::Godmode => tse_core::cheats::godmode(&mut tree, args.dry_run),
        CheatKind::Stats => {
            let c = tse_core::cheats::insane_stats(&mut tree, args.dry_run);
            c.character + c.stats_primary + c.stats_secondary
        }
        CheatKind::Currency => tse_core::cheats::max_currency(&mut tree, 999_999_999, true, args.dry_run),
        CheatKind::Locations => tse_core::cheats::unlock_all_locations(&mut tree, args.dry_run),
        CheatKind::Achievements => {
            let (found, n) = tse_core::cheats::auto_plat_achievements(&mut tree, args.dry_run);
            if !found {
                eprintln!("no achievement blocks found");
            }
            n
        }
    };
    println!(
        "{} field(s) {}",
        changed,
        if args.dry_run { "would change" } else { "changed" }
    );
    if !args.dry_run && let Some(out) = args.out {
        emit_tree(&tree, Some(out));
    }
}

fn cmd_backup(args: BackupArgs) {
    match tse_core::backup::zip_backup(&args.path) {
        Ok(p) => println!("backup: {}", p.display()),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}
