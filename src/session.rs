use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use directories::ProjectDirs;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
};
use uuid::Uuid;

const SESSION_FILE: &str = "session.json";

static PLAYER_ID: OnceLock<PlayerId> = OnceLock::new();

/// Stable per-installation player identifier sent with bets and cashouts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SessionRecord {
    player_id: PlayerId,
}

/// Durable key-value file holding the player id.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).wrap_err_with(|| {
                format!("Failed to create session directory {}", dir.display())
            })?;
        }
        Ok(Self {
            path: dir.join(SESSION_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored player id, creating and persisting a fresh one if absent.
    pub fn load_or_create(&self) -> Result<PlayerId> {
        if let Some(record) = self.read_record()? {
            return Ok(record.player_id);
        }
        let player_id = PlayerId::generate();
        self.write_record(&SessionRecord {
            player_id: player_id.clone(),
        })?;
        tracing::info!(%player_id, path = %self.path.display(), "created new player id");
        Ok(player_id)
    }

    fn read_record(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).wrap_err("Failed to read session file")?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let record = serde_json::from_slice::<SessionRecord>(&data)
            .wrap_err("Failed to parse session file JSON")?;
        Ok(Some(record))
    }

    fn write_record(&self, record: &SessionRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .wrap_err("Failed to serialize session record")?;
        fs::write(&self.path, json).wrap_err("Failed to write session file")?;
        Ok(())
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "chicken-crash")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| eyre!("could not resolve a data directory for chicken-crash"))
}

pub fn resolve_data_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_data_dir(),
    }
}

/// Reads or creates the player id once per process. Later calls return the
/// id installed by the first one.
pub fn init(store: &SessionStore) -> Result<&'static PlayerId> {
    if let Some(existing) = PLAYER_ID.get() {
        return Ok(existing);
    }
    let player_id = store.load_or_create()?;
    Ok(PLAYER_ID.get_or_init(|| player_id))
}

pub fn player_id() -> Option<&'static PlayerId> {
    PLAYER_ID.get()
}
