//! Tracked editor state.
//!
//! Each connected editor client gets one [`ClientState`] snapshot, filled
//! in by unsolicited pushes. Pushes are partial: only the fields a push
//! provides are merged, everything else keeps its previous value.

use crate::message::StatePush;

/// Sentinel for string fields no push has set yet.
pub const UNKNOWN: &str = "N/A";

/// Last-known state of one editor client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientState {
    pub version: String,

    pub debug: bool,
    pub debug_name: String,
    pub debug_breakpoints: u32,

    pub environment_host: String,
    pub environment_name: String,
    pub environment_language: String,
    pub environment_remote: String,
    pub environment_shell: String,

    pub workspace_name: String,
    pub workspace_trusted: bool,
    pub workspace_folders: Vec<String>,

    pub git_branch: String,
    pub git_commit: String,
    pub git_remote: String,
    pub git_url: String,
    pub git_ahead: u32,
    pub git_behind: u32,
    pub git_changes: u32,

    pub editor_name: String,
    pub editor_path: String,
    pub editor_language: String,
    pub editor_encoding: String,
    pub editor_eol: String,
    pub editor_indent: u32,
    pub editor_tabs: bool,
    pub editor_column: u32,
    pub editor_line: u32,
    pub editor_lines: u32,
    pub editor_warnings: u32,
    pub editor_errors: u32,
    pub editor_dirty: bool,

    pub commands: Vec<String>,
    pub extensions: Vec<String>,
    pub extensions_active: Vec<String>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            version: UNKNOWN.into(),
            debug: false,
            debug_name: UNKNOWN.into(),
            debug_breakpoints: 0,
            environment_host: UNKNOWN.into(),
            environment_name: UNKNOWN.into(),
            environment_language: UNKNOWN.into(),
            environment_remote: UNKNOWN.into(),
            environment_shell: UNKNOWN.into(),
            workspace_name: UNKNOWN.into(),
            workspace_trusted: false,
            workspace_folders: Vec::new(),
            git_branch: UNKNOWN.into(),
            git_commit: UNKNOWN.into(),
            git_remote: UNKNOWN.into(),
            git_url: UNKNOWN.into(),
            git_ahead: 0,
            git_behind: 0,
            git_changes: 0,
            editor_name: UNKNOWN.into(),
            editor_path: UNKNOWN.into(),
            editor_language: UNKNOWN.into(),
            editor_encoding: UNKNOWN.into(),
            editor_eol: UNKNOWN.into(),
            editor_indent: 0,
            editor_tabs: false,
            editor_column: 0,
            editor_line: 0,
            editor_lines: 0,
            editor_warnings: 0,
            editor_errors: 0,
            editor_dirty: false,
            commands: Vec::new(),
            extensions: Vec::new(),
            extensions_active: Vec::new(),
        }
    }
}

impl ClientState {
    /// Number of commands the client advertises.
    pub fn commands_count(&self) -> usize {
        self.commands.len()
    }

    /// Number of installed / active extensions.
    pub fn extensions_count(&self) -> usize {
        self.extensions.len()
    }

    pub fn extensions_active_count(&self) -> usize {
        self.extensions_active.len()
    }

    /// Merge one push into the snapshot.
    ///
    /// Absent optional fields leave the stored value untouched. `Focus`
    /// carries no state; primary arbitration happens in the hub.
    pub fn apply(&mut self, push: &StatePush) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        match push {
            StatePush::Version { version } => self.version = version.clone(),

            StatePush::Focus { .. } => {}

            StatePush::Commands { commands } => self.commands = commands.clone(),

            StatePush::Debug {
                debug,
                name,
                breakpoints,
            } => {
                self.debug = *debug;
                set(&mut self.debug_name, name);
                set(&mut self.debug_breakpoints, breakpoints);
            }

            StatePush::Environment {
                host,
                name,
                language,
                remote,
                shell,
            } => {
                set(&mut self.environment_host, host);
                set(&mut self.environment_name, name);
                set(&mut self.environment_language, language);
                set(&mut self.environment_remote, remote);
                set(&mut self.environment_shell, shell);
            }

            StatePush::Extensions { extensions, active } => {
                self.extensions = extensions.clone();
                self.extensions_active = active.clone();
            }

            StatePush::Workspace {
                name,
                trusted,
                folders,
            } => {
                set(&mut self.workspace_name, name);
                set(&mut self.workspace_trusted, trusted);
                set(&mut self.workspace_folders, folders);
            }

            StatePush::Git {
                branch,
                commit,
                remote,
                url,
                ahead,
                behind,
                changes,
            } => {
                set(&mut self.git_branch, branch);
                set(&mut self.git_commit, commit);
                set(&mut self.git_remote, remote);
                set(&mut self.git_url, url);
                set(&mut self.git_ahead, ahead);
                set(&mut self.git_behind, behind);
                set(&mut self.git_changes, changes);
            }

            StatePush::Editor {
                name,
                path,
                language,
                encoding,
                eol,
                indent,
                tabs,
                column,
                line,
                lines,
                warnings,
                errors,
                dirty,
            } => {
                set(&mut self.editor_name, name);
                set(&mut self.editor_path, path);
                set(&mut self.editor_language, language);
                set(&mut self.editor_encoding, encoding);
                set(&mut self.editor_eol, eol);
                set(&mut self.editor_indent, indent);
                set(&mut self.editor_tabs, tabs);
                set(&mut self.editor_column, column);
                set(&mut self.editor_line, line);
                set(&mut self.editor_lines, lines);
                set(&mut self.editor_warnings, warnings);
                set(&mut self.editor_errors, errors);
                set(&mut self.editor_dirty, dirty);
            }
        }
    }
}
