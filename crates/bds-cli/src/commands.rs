use std::fs::{self, File};
use std::path::Path;

use anyhow::{bail, Context};
use bds_store::{BalancedStorage, Key, KeyFormat, StoreConfig, StoredEntry};
use colored::Colorize;
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli.storage)?;
    let store = BalancedStorage::open_with_archives(config)?;
    tracing::debug!(?store, "store ready");

    match cli.command {
        Command::Add(args) => cmd_add(&store, &args, &cli.format),
        Command::AddArchive(args) => cmd_add_archive(&store, &args, &cli.format),
        Command::Key(args) => cmd_key(&store, &args, &cli.format),
        Command::Lookup(args) => cmd_lookup(&store, &args, &cli.format),
        Command::Delete(args) => cmd_delete(&store, &args),
        Command::DeleteFile(args) => cmd_delete_file(&store, &args),
        Command::List => cmd_list(&store, &cli.format),
    }
}

/// Build the store configuration from `--config` and the override flags.
pub fn resolve_config(args: &StorageArgs) -> anyhow::Result<StoreConfig> {
    let mut config = match (&args.config, &args.root) {
        (Some(path), _) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<StoreConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        (None, Some(root)) => StoreConfig::new(root),
        (None, None) => bail!("either --root or --config must be given"),
    };

    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(limit) = args.dir_limit {
        config.directory_limit = limit;
    }
    if let Some(size) = args.block_size {
        config.read_block_size = size;
    }
    if let Some(algorithm) = args.algorithm {
        config.hash_algorithm = algorithm;
    }
    if let Some(format) = args.key_format {
        config.key_format = match format {
            KeyFormatArg::SizeSuffixed => KeyFormat::SizeSuffixed,
            KeyFormatArg::Bare => KeyFormat::Bare,
        };
    }
    if let Some(max) = args.max_archive_entries {
        config.max_archive_entries = Some(max);
    }
    Ok(config)
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("opening {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entries(
    entries: &[StoredEntry],
    format: &OutputFormat,
    verb: &str,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            for entry in entries {
                println!(
                    "{} {} {}",
                    verb.green(),
                    entry.key.to_string().yellow(),
                    entry.display_path()
                );
            }
            Ok(())
        }
    }
}

fn cmd_add(
    store: &BalancedStorage,
    args: &PathsArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let mut entries = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let entry = store
            .add_file(&mut open(path)?)
            .with_context(|| format!("storing {}", path.display()))?;
        entries.push(entry);
    }
    print_entries(&entries, format, "stored:")
}

fn cmd_add_archive(
    store: &BalancedStorage,
    args: &PathsArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let mut entries = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let entry = store
            .add_archive(&mut open(path)?)
            .with_context(|| format!("expanding {}", path.display()))?;
        entries.push(entry);
    }
    print_entries(&entries, format, "expanded:")
}

fn cmd_key(store: &BalancedStorage, args: &PathsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct KeyLine<'a> {
        file: &'a Path,
        key: Key,
    }

    let mut lines = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let key = store.key_for(&mut open(path)?)?;
        lines.push(KeyLine { file: path, key });
    }
    match format {
        OutputFormat::Json => print_json(&lines),
        OutputFormat::Text => {
            for line in &lines {
                println!("{}  {}", line.key.to_string().yellow(), line.file.display());
            }
            Ok(())
        }
    }
}

fn cmd_lookup(
    store: &BalancedStorage,
    args: &KeysArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let mut entries = Vec::with_capacity(args.keys.len());
    for key in &args.keys {
        entries.push(store.lookup_str(key)?);
    }
    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}", entry.display_path());
            }
            Ok(())
        }
    }
}

fn cmd_delete(store: &BalancedStorage, args: &KeysArgs) -> anyhow::Result<()> {
    for key in &args.keys {
        store.delete(&Key::parse(key)?)?;
        println!("{} {}", "deleted:".red(), key.yellow());
    }
    Ok(())
}

fn cmd_delete_file(store: &BalancedStorage, args: &PathsArgs) -> anyhow::Result<()> {
    for path in &args.paths {
        store
            .delete_by_source(&mut open(path)?)
            .with_context(|| format!("deleting content of {}", path.display()))?;
        println!("{} {}", "deleted:".red(), path.display());
    }
    Ok(())
}

fn cmd_list(store: &BalancedStorage, format: &OutputFormat) -> anyhow::Result<()> {
    let keys = store.keys()?;
    match format {
        OutputFormat::Json => print_json(&keys),
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
            println!("{} {} entries", "✓".green().bold(), keys.len().to_string().bold());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bds_crypto::HashAlgorithm;

    #[test]
    fn root_flag_alone_uses_defaults() {
        let args = StorageArgs {
            root: Some("/srv/store".into()),
            ..StorageArgs::default()
        };
        assert_eq!(resolve_config(&args).unwrap(), StoreConfig::new("/srv/store"));
    }

    #[test]
    fn missing_root_and_config_is_an_error() {
        assert!(resolve_config(&StorageArgs::default()).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bds.toml");
        fs::write(
            &path,
            "root = \"/srv/store\"\ndirectory_limit = 10\nhash_algorithm = \"blake3\"\n",
        )
        .unwrap();

        let args = StorageArgs {
            config: Some(path),
            dir_limit: Some(3),
            key_format: Some(KeyFormatArg::Bare),
            ..StorageArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.root, std::path::PathBuf::from("/srv/store"));
        assert_eq!(config.directory_limit, 3);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.key_format, KeyFormat::Bare);
    }

    #[test]
    fn add_then_delete_through_commands() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("store");
        fs::create_dir(&root).unwrap();
        let file = tmp.path().join("a_file");
        fs::write(&file, b"a\n").unwrap();

        let config = resolve_config(&StorageArgs {
            root: Some(root),
            ..StorageArgs::default()
        })
        .unwrap();
        let store = BalancedStorage::open_with_archives(config).unwrap();

        let paths = PathsArgs { paths: vec![file] };
        cmd_add(&store, &paths, &OutputFormat::Json).unwrap();
        assert_eq!(store.keys().unwrap().len(), 1);

        cmd_delete_file(&store, &paths).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
