use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;

use crate::contact::Header;

const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "contacts.db";
const LOG_FILE_NAME: &str = "cardbox.log";
pub const APP_NAME: &str = "cardbox";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub log_level: String,
    pub table: TableConfig,
    pub keys: Keys,
    pub ui: UiConfig,
    /// Keys in the file that nothing reads, reported once logging is up
    pub unknown_keys: Vec<String>,
}

impl Config {
    /// Configuration used when no config file exists.
    pub fn defaults(config_path: PathBuf) -> Result<Self> {
        Self::from_file(ConfigFile::default(), config_path)
    }

    fn from_file(file: ConfigFile, config_path: PathBuf) -> Result<Self> {
        let db_path = match file.db_path {
            Some(path) => expand_tilde(&path),
            None => default_db_path()?,
        };

        let keys: Keys = file.keys.into();
        validate_key_bindings(&keys)?;

        Ok(Self {
            config_path,
            db_path,
            log_level: file.log_level,
            table: file.table.into(),
            keys,
            ui: file.ui.into(),
            unknown_keys: Vec::new(),
        })
    }
}

// =============================================================================
// Table Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Column labels that stay searchable but are not drawn
    pub hidden_columns: Vec<String>,
}

impl TableConfig {
    /// Switch off the configured columns.
    pub fn apply(&self, mut headers: Vec<Header>) -> Vec<Header> {
        for header in &mut headers {
            if self
                .hidden_columns
                .iter()
                .any(|hidden| hidden.trim().eq_ignore_ascii_case(&header.text))
            {
                header.display = false;
            }
        }
        headers
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct TableFile {
    hidden_columns: Vec<String>,
}

impl From<TableFile> for TableConfig {
    fn from(file: TableFile) -> Self {
        Self {
            hidden_columns: file.hidden_columns,
        }
    }
}

// =============================================================================
// UI Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub header: RgbColor,
    pub placeholder: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    header: RgbColor,
    placeholder: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            header: RgbColor::new(255, 165, 0),
            placeholder: RgbColor::new(128, 128, 128),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        Self {
            colors: UiColors {
                border: file.colors.border,
                selection_bg: file.colors.selection_bg,
                selection_fg: file.colors.selection_fg,
                header: file.colors.header,
                placeholder: file.colors.placeholder,
                status_fg: file.colors.status_fg,
                status_bg: file.colors.status_bg,
            },
        }
    }
}

// =============================================================================
// Key Bindings - Context-aware with multiple bindings per action
// =============================================================================

/// All key bindings organized by context
#[derive(Debug, Clone, Default)]
pub struct Keys {
    /// Keys that work whenever no form is open
    pub global: GlobalKeys,
    /// Keys for the contact table
    pub table: TableKeys,
    /// Keys for the add/edit form
    pub form: FormKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub search: Vec<String>,
    pub add: Vec<String>,
    pub help: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TableKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub page_down: Vec<String>,
    pub page_up: Vec<String>,
    pub first: Vec<String>,
    pub last: Vec<String>,
    pub edit: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FormKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub save: Vec<String>,
    pub cancel: Vec<String>,
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: vec!["q".into()],
            search: vec!["/".into()],
            add: vec!["a".into(), "F2".into()],
            help: vec!["F1".into(), "?".into()],
        }
    }
}

impl Default for TableKeys {
    fn default() -> Self {
        Self {
            next: vec!["j".into(), "Down".into()],
            prev: vec!["k".into(), "Up".into()],
            page_down: vec!["PageDown".into()],
            page_up: vec!["PageUp".into()],
            first: vec!["g".into(), "Home".into()],
            last: vec!["G".into(), "End".into()],
            edit: vec!["e".into(), "Enter".into()],
        }
    }
}

impl Default for FormKeys {
    fn default() -> Self {
        Self {
            next: vec!["Tab".into(), "Down".into()],
            prev: vec!["Backtab".into(), "Up".into()],
            save: vec!["Enter".into()],
            cancel: vec!["Escape".into()],
        }
    }
}

// Serde deserialization types (support both single string and array)

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    table: TableKeysFile,
    form: FormKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalKeysFile {
    quit: KeyBinding,
    search: KeyBinding,
    add: KeyBinding,
    help: KeyBinding,
}

impl Default for GlobalKeysFile {
    fn default() -> Self {
        let defaults = GlobalKeys::default();
        Self {
            quit: KeyBinding::Multiple(defaults.quit),
            search: KeyBinding::Multiple(defaults.search),
            add: KeyBinding::Multiple(defaults.add),
            help: KeyBinding::Multiple(defaults.help),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TableKeysFile {
    next: KeyBinding,
    prev: KeyBinding,
    page_down: KeyBinding,
    page_up: KeyBinding,
    first: KeyBinding,
    last: KeyBinding,
    edit: KeyBinding,
}

impl Default for TableKeysFile {
    fn default() -> Self {
        let defaults = TableKeys::default();
        Self {
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            page_down: KeyBinding::Multiple(defaults.page_down),
            page_up: KeyBinding::Multiple(defaults.page_up),
            first: KeyBinding::Multiple(defaults.first),
            last: KeyBinding::Multiple(defaults.last),
            edit: KeyBinding::Multiple(defaults.edit),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FormKeysFile {
    next: KeyBinding,
    prev: KeyBinding,
    save: KeyBinding,
    cancel: KeyBinding,
}

impl Default for FormKeysFile {
    fn default() -> Self {
        let defaults = FormKeys::default();
        Self {
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            save: KeyBinding::Multiple(defaults.save),
            cancel: KeyBinding::Multiple(defaults.cancel),
        }
    }
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: file.global.into(),
            table: file.table.into(),
            form: file.form.into(),
        }
    }
}

impl From<GlobalKeysFile> for GlobalKeys {
    fn from(file: GlobalKeysFile) -> Self {
        Self {
            quit: file.quit.into_vec(),
            search: file.search.into_vec(),
            add: file.add.into_vec(),
            help: file.help.into_vec(),
        }
    }
}

impl From<TableKeysFile> for TableKeys {
    fn from(file: TableKeysFile) -> Self {
        Self {
            next: file.next.into_vec(),
            prev: file.prev.into_vec(),
            page_down: file.page_down.into_vec(),
            page_up: file.page_up.into_vec(),
            first: file.first.into_vec(),
            last: file.last.into_vec(),
            edit: file.edit.into_vec(),
        }
    }
}

impl From<FormKeysFile> for FormKeys {
    fn from(file: FormKeysFile) -> Self {
        Self {
            next: file.next.into_vec(),
            prev: file.prev.into_vec(),
            save: file.save.into_vec(),
            cancel: file.cancel.into_vec(),
        }
    }
}

/// Canonical form for collision detection: single characters keep their case
/// ('G' is Shift+g), named keys are case-insensitive.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

/// The table is active together with the global keys, so they share one context.
fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("search", &keys.global.search),
            ("add", &keys.global.add),
            ("help", &keys.global.help),
            ("next", &keys.table.next),
            ("prev", &keys.table.prev),
            ("page_down", &keys.table.page_down),
            ("page_up", &keys.table.page_up),
            ("first", &keys.table.first),
            ("last", &keys.table.last),
            ("edit", &keys.table.edit),
        ],
        "global/table",
    )?;

    check_context_collisions(
        &[
            ("next", &keys.form.next),
            ("prev", &keys.form.prev),
            ("save", &keys.form.save),
            ("cancel", &keys.form.cancel),
        ],
        "form",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    db_path: Option<PathBuf>,
    log_level: String,
    table: TableFile,
    keys: KeysFile,
    ui: UiFile,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: "info".to_string(),
            table: TableFile::default(),
            keys: KeysFile::default(),
            ui: UiFile::default(),
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn data_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(data_root()?.join(DB_FILE_NAME))
}

pub fn default_log_path() -> Result<PathBuf> {
    Ok(data_root()?.join(LOG_FILE_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration from `path`, or the default location.
/// A missing file yields the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        return Config::defaults(path);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse(&raw, path)
}

fn parse(raw: &str, path: PathBuf) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    let unknown = unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let mut config = Config::from_file(cfg_file, path)?;
    config.unknown_keys = unknown;
    Ok(config)
}

// =============================================================================
// Unknown keys
// =============================================================================

fn unknown_keys(value: &toml::Value) -> Vec<String> {
    let mut unknown = Vec::new();
    let Some(table) = value.as_table() else {
        return unknown;
    };

    collect_unknown(&mut unknown, value, "", &["db_path", "log_level", "table", "keys", "ui"]);

    if let Some(table_val) = table.get("table") {
        collect_unknown(&mut unknown, table_val, "table", &["hidden_columns"]);
    }

    if let Some(keys_val) = table.get("keys") {
        collect_unknown(&mut unknown, keys_val, "keys", &["global", "table", "form"]);
        if let Some(keys) = keys_val.as_table() {
            if let Some(global) = keys.get("global") {
                collect_unknown(&mut unknown, global, "keys.global", &["quit", "search", "add", "help"]);
            }
            if let Some(table_keys) = keys.get("table") {
                collect_unknown(
                    &mut unknown,
                    table_keys,
                    "keys.table",
                    &["next", "prev", "page_down", "page_up", "first", "last", "edit"],
                );
            }
            if let Some(form) = keys.get("form") {
                collect_unknown(&mut unknown, form, "keys.form", &["next", "prev", "save", "cancel"]);
            }
        }
    }

    if let Some(ui_val) = table.get("ui") {
        collect_unknown(&mut unknown, ui_val, "ui", &["colors"]);
        if let Some(colors) = ui_val.as_table().and_then(|ui| ui.get("colors")) {
            collect_unknown(
                &mut unknown,
                colors,
                "ui.colors",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "header",
                    "placeholder",
                    "status_fg",
                    "status_bg",
                ],
            );
        }
    }

    unknown
}

fn collect_unknown(out: &mut Vec<String>, value: &toml::Value, context: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            if context.is_empty() {
                out.push(key.clone());
            } else {
                out.push(format!("{}.{}", context, key));
            }
        }
    }
}
