use clap::ValueEnum;

/// What to do when two selected files share a basename.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollisionMode {
    /// Suffix later files as `<stem>_<n>.<ext>`
    #[default]
    Rename,
    /// Write to the same path one after another; the last to finish wins
    Overwrite,
}
