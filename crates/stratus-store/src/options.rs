use stratus_types::DataFormat;

/// What the caller intends to do with the data.
///
/// Recorded in the audit history; caches may use it to decide whether a
/// retrieved copy can be a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Intent {
    /// Read-only consumption.
    #[default]
    In,
    /// The caller may modify the local copy.
    InOut,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::InOut => "inout",
        }
    }
}

/// Options for `Store::retrieve`.
#[derive(Clone, Debug, Default)]
pub struct GetOptions {
    pub intent: Intent,
    pub fmt: Option<DataFormat>,
    /// Unpack a recognized archive destination after copy.
    pub tar_extract: bool,
    /// Copy children of a directory source individually.
    pub dir_extract: bool,
    /// Demote miss logging to debug level.
    pub silent: bool,
}

/// Options for `Store::insert`.
#[derive(Clone, Debug)]
pub struct PutOptions {
    pub intent: Intent,
    pub fmt: Option<DataFormat>,
    /// Block until the transfer completes. When `false`, archive stores
    /// stage the source locally and hand the transfer to the spool queue.
    pub sync: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            intent: Intent::In,
            fmt: None,
            sync: true,
        }
    }
}

/// Options for `Store::delete`.
#[derive(Clone, Debug, Default)]
pub struct DelOptions {
    pub fmt: Option<DataFormat>,
}
