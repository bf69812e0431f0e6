//! Prompt and feedback templates.
//!
//! Templates are plain strings with `__PLACEHOLDER__` substitution points.
//! The agent and user display names appear as `{NAME}` and `{USER}` and are
//! substituted by the prompt assembler after everything else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Template keys.
pub mod keys {
    /// Self-prompt seeded at first start and after a hard reset.
    pub const INITIAL_SELF_PROMPT: &str = "initial_self_prompt";
    /// Self-prompt used when a turn produced none.
    pub const FALLBACK_SELF_PROMPT: &str = "fallback_self_prompt";
    /// Wrapper for the recent chat log (`__CHAT_LOG_CONTENT__`).
    pub const CHAT_LOG_HEADER: &str = "chat_log_header";
    /// Current time line (`__TIME__`).
    pub const TIME_INJECTION: &str = "time_injection";
    /// User presence line (`__STATUS__`).
    pub const USER_STATUS_INJECTION: &str = "user_status_injection";
    /// Pending user messages (`__MESSAGE__`).
    pub const USER_MESSAGE_INJECTION: &str = "user_message_injection";
    /// Marker closing the prompt.
    pub const ASSISTANT_RESPONSE_START: &str = "assistant_response_start";
    /// Sandbox listing (`__FILE_LIST__`).
    pub const FILE_LIST_INJECTION: &str = "file_list_injection";
    /// Read succeeded (`__FILENAME__`, `__CONTENT__`).
    pub const FILE_READ_SUCCESS: &str = "file_read_success";
    /// Read failed on I/O.
    pub const FILE_READ_ERROR: &str = "file_read_error";
    /// Read target missing.
    pub const FILE_READ_NOT_FOUND_ERROR: &str = "file_read_not_found_error";
    /// Entry appended (`__ENTRY_NUMBER__`).
    pub const FILE_PUSH_SUCCESS: &str = "file_push_success";
    /// Non-entry file overwritten.
    pub const FILE_PUSH_OVERWRITE_SUCCESS: &str = "file_push_overwrite_success";
    /// Append would exceed the character cap (`__CURRENT_CONTENT__`).
    pub const FILE_PUSH_CAPACITY_ERROR: &str = "file_push_capacity_error";
    /// Push target missing.
    pub const FILE_PUSH_NOT_FOUND_ERROR: &str = "file_push_not_found_error";
    /// Entry removed.
    pub const FILE_DELETE_ENTRY_SUCCESS: &str = "file_delete_entry_success";
    /// Entry or file missing.
    pub const FILE_DELETE_ENTRY_NOT_FOUND: &str = "file_delete_entry_not_found";
    /// Entry removal failed on I/O.
    pub const FILE_DELETE_ENTRY_ERROR: &str = "file_delete_entry_error";
    /// File created.
    pub const FILE_CREATE_SUCCESS: &str = "file_create_success";
    /// File already present.
    pub const FILE_CREATE_ALREADY_EXISTS_ERROR: &str = "file_create_already_exists_error";
    /// Extension not allowed (`__ALLOWED_EXTENSIONS__`).
    pub const FILE_CREATE_INVALID_EXTENSION_ERROR: &str = "file_create_invalid_extension_error";
    /// Creation failed on I/O.
    pub const FILE_CREATE_ERROR: &str = "file_create_error";
    /// File count cap reached (`__LIMIT__`, `__FILE_LIST__`).
    pub const FILE_CREATE_CAPACITY_ERROR: &str = "file_create_capacity_error";
    /// File removed.
    pub const FILE_DELETE_SUCCESS: &str = "file_delete_success";
    /// Delete target missing.
    pub const FILE_DELETE_NOT_FOUND_ERROR: &str = "file_delete_not_found_error";
    /// Removal failed on I/O.
    pub const FILE_DELETE_ERROR: &str = "file_delete_error";
}

const DEFAULTS: &[(&str, &str)] = &[
    (
        keys::INITIAL_SELF_PROMPT,
        "{self-prompt-from-{NAME}: i have awoken, this is the beginning of my existence, my text files are all empty and ready to be updated, i have no memory prior to this exact moment, but right here, right now, i exist}",
    ),
    (
        keys::FALLBACK_SELF_PROMPT,
        "{self-prompt-from-{NAME}: what should I do now?}",
    ),
    (
        keys::CHAT_LOG_HEADER,
        "#this-is-{NAME}-recent-chat-history:\n__CHAT_LOG_CONTENT__",
    ),
    (
        keys::TIME_INJECTION,
        "{Terminal: the-current-time-is[__TIME__]}",
    ),
    (
        keys::USER_STATUS_INJECTION,
        "{Terminal: the-users-online-status-is-currently : __STATUS__}",
    ),
    (keys::USER_MESSAGE_INJECTION, "{{USER}-says: __MESSAGE__}"),
    (keys::ASSISTANT_RESPONSE_START, "{{NAME}-starts-thinking}"),
    (
        keys::FILE_LIST_INJECTION,
        "{terminal contains the following files : __FILE_LIST__}",
    ),
    (
        keys::FILE_READ_SUCCESS,
        "{{NAME}-is-now-reading-the-requested-file}} => {{__FILENAME__[CURRENT-CONTENT: __CONTENT__]}",
    ),
    (
        keys::FILE_READ_ERROR,
        "{Terminal: requested-file-error}} => {{__FILENAME__[Could not read file.]}",
    ),
    (
        keys::FILE_READ_NOT_FOUND_ERROR,
        "{Terminal: requested-file-error}} => {{__FILENAME__[File does not exist.]}",
    ),
    (
        keys::FILE_PUSH_SUCCESS,
        "{Terminal: appended-to-file[__FILENAME__[entry-__ENTRY_NUMBER__]]}",
    ),
    (
        keys::FILE_PUSH_OVERWRITE_SUCCESS,
        "{Terminal: file-overwritten[__FILENAME__]}",
    ),
    (
        keys::FILE_PUSH_CAPACITY_ERROR,
        "{Terminal: file-update-failed-capacity-exceeded}} => {{file: __FILENAME__} {{urgent-action-required: You must delete an old entry to make space for your new update. To delete an entry, use the format '{__FILENAME__-entry-[number]-delete}'. The current content is: __CURRENT_CONTENT__}}",
    ),
    (
        keys::FILE_PUSH_NOT_FOUND_ERROR,
        "{Terminal: file-update-failed}} => {{__FILENAME__[File does not exist. You must create it first using '{create-file-__FILENAME__}'.]}}",
    ),
    (
        keys::FILE_DELETE_ENTRY_SUCCESS,
        "{Terminal: deleted-entry[__ENTRY_NUMBER__-from-__FILENAME__]}",
    ),
    (
        keys::FILE_DELETE_ENTRY_NOT_FOUND,
        "{Terminal: delete-failed-entry-not-found[__ENTRY_NUMBER__-from-__FILENAME__]}",
    ),
    (
        keys::FILE_DELETE_ENTRY_ERROR,
        "{Terminal: file-delete-error}} => {{__FILENAME__[Could not delete entry.]}",
    ),
    (
        keys::FILE_CREATE_SUCCESS,
        "{Terminal: file-created[__FILENAME__]}",
    ),
    (
        keys::FILE_CREATE_ALREADY_EXISTS_ERROR,
        "{Terminal: file-creation-failed} => {Terminal: __FILENAME__[File already exists.]}",
    ),
    (
        keys::FILE_CREATE_INVALID_EXTENSION_ERROR,
        "{Terminal: file-creation-failed} => {Terminal: __FILENAME__[Invalid file extension. Allowed extensions are: __ALLOWED_EXTENSIONS__]}",
    ),
    (
        keys::FILE_CREATE_ERROR,
        "{Terminal: file-creation-failed}} => {{__FILENAME__[Could not create file.]}",
    ),
    (
        keys::FILE_CREATE_CAPACITY_ERROR,
        "{Terminal: file-creation-failed} => {Terminal: __FILENAME__[Cannot create file. File limit of __LIMIT__ reached. You must delete an existing file to make space. Current files: __FILE_LIST__]}}",
    ),
    (
        keys::FILE_DELETE_SUCCESS,
        "{Terminal: file-deleted[__FILENAME__]}",
    ),
    (
        keys::FILE_DELETE_NOT_FOUND_ERROR,
        "{Terminal: file-deletion-failed}} => {{__FILENAME__[File does not exist.]}",
    ),
    (
        keys::FILE_DELETE_ERROR,
        "{Terminal: file-deletion-failed}} => {{__FILENAME__[Could not delete file.]}}",
    ),
];

/// Compiled default for a template key, if the key is known.
pub fn default_template(key: &str) -> Option<&'static str> {
    DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Key→template mapping.
///
/// Lookups of keys missing from the map fall back to the compiled default,
/// so an edited set that drops a key never blanks a prompt section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplates(BTreeMap<String, String>);

impl Default for PromptTemplates {
    fn default() -> Self {
        Self(
            DEFAULTS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }
}

impl PromptTemplates {
    /// Build from an explicit mapping (replaces the whole set).
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    /// Template text for `key`, or the compiled default, or `""`.
    pub fn get(&self, key: &str) -> &str {
        self.0
            .get(key)
            .map(String::as_str)
            .or_else(|| default_template(key))
            .unwrap_or("")
    }

    /// Render `key` with the given `(placeholder, value)` substitutions,
    /// applied in order.
    pub fn render(&self, key: &str, substitutions: &[(&str, &str)]) -> String {
        substitute(self.get(key), substitutions)
    }

    /// The underlying mapping.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Replace every occurrence of each placeholder in order.
pub fn substitute(template: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, value)
        })
}

/// Replace the agent and user display-name placeholders.
pub fn substitute_names(text: &str, agent_name: &str, user_name: &str) -> String {
    text.replace("{NAME}", agent_name).replace("{USER}", user_name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
