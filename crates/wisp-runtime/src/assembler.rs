//! Prompt assembly.
//!
//! A prompt has two halves:
//!
//! - **system**: base prompt, memory tiers (long-term first), recent chat
//! - **dynamic**: everything that changes per turn, ending with the marker
//!   that hands over to the model
//!
//! The dynamic half is also logged on its own so the front end can show what
//! was new this turn. Agent and user names are substituted last.

use chrono::{DateTime, Local};
use wisp_core::{MemorySnapshot, TierKind, UserStatus};
use wisp_memory::bullet_lines;
use wisp_settings::{MemoryPromptHeaders, PromptTemplates, keys, substitute_names};

/// `strftime` layout of the time injection.
pub const TIME_FORMAT: &str = "[time : %I:%M:%S %p][day: %d][month: %m][year: %Y]";

/// Everything a prompt is built from.
#[derive(Debug)]
pub struct PromptContext<'a> {
    /// Base system prompt.
    pub system_prompt: &'a str,
    /// Memory tiers.
    pub memory: &'a MemorySnapshot,
    /// Per-tier headers.
    pub headers: &'a MemoryPromptHeaders,
    /// Recent chat, rendered as `speaker: text` lines.
    pub chat_log: &'a str,
    /// Templates for every injected line.
    pub templates: &'a PromptTemplates,
    /// Sandbox listing.
    pub files: &'a [String],
    /// Injector text; empty when unset.
    pub input_injector: &'a str,
    /// Wall-clock time for the time injection.
    pub now: DateTime<Local>,
    /// User presence.
    pub user_status: UserStatus,
    /// Self-prompt blocks carried from the previous turn.
    pub self_prompts: &'a [String],
    /// Interpreter feedback from the previous turn.
    pub feedback: &'a str,
    /// Pending user messages.
    pub pending_messages: &'a [String],
    /// Agent display name.
    pub agent_name: &'a str,
    /// User display name.
    pub user_name: &'a str,
}

/// An assembled prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// `system + "\n" + dynamic`, sent to the service.
    pub full: String,
    /// The per-turn half alone.
    pub dynamic: String,
}

/// Build the prompt for one turn.
pub fn assemble(ctx: &PromptContext<'_>) -> AssembledPrompt {
    let system = system_section(ctx);
    let dynamic = dynamic_section(ctx);
    let full = format!("{system}\n{dynamic}");
    AssembledPrompt {
        full: substitute_names(&full, ctx.agent_name, ctx.user_name),
        dynamic: substitute_names(&dynamic, ctx.agent_name, ctx.user_name),
    }
}

fn system_section(ctx: &PromptContext<'_>) -> String {
    let mut parts = vec![ctx.system_prompt.to_string()];

    for tier in [TierKind::Ltm, TierKind::Mtm, TierKind::Stm] {
        let entries = ctx.memory.tier(tier);
        if entries.is_empty() {
            continue;
        }
        parts.push(format!("\n{}", ctx.headers.get(tier)));
        parts.push(bullet_lines(entries));
    }

    if !ctx.chat_log.is_empty() {
        parts.push(
            ctx.templates
                .render(keys::CHAT_LOG_HEADER, &[("__CHAT_LOG_CONTENT__", ctx.chat_log)]),
        );
    }

    parts.join("\n")
}

fn dynamic_section(ctx: &PromptContext<'_>) -> String {
    let t = ctx.templates;
    let file_list = if ctx.files.is_empty() {
        "none".to_string()
    } else {
        ctx.files.join(", ")
    };
    let time = ctx.now.format(TIME_FORMAT).to_string();
    let self_prompts = ctx
        .self_prompts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    let mut parts = vec![
        t.render(keys::FILE_LIST_INJECTION, &[("__FILE_LIST__", &file_list)]),
        ctx.input_injector.to_string(),
        t.render(keys::TIME_INJECTION, &[("__TIME__", &time)]),
        t.render(
            keys::USER_STATUS_INJECTION,
            &[("__STATUS__", ctx.user_status.as_str())],
        ),
        self_prompts,
        ctx.feedback.to_string(),
    ];
    if !ctx.pending_messages.is_empty() {
        let message = ctx.pending_messages.join(" ");
        parts.push(t.render(keys::USER_MESSAGE_INJECTION, &[("__MESSAGE__", &message)]));
    }
    parts.push(t.get(keys::ASSISTANT_RESPONSE_START).to_string());

    parts.retain(|p| !p.is_empty());
    parts.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixture {
        memory: MemorySnapshot,
        headers: MemoryPromptHeaders,
        templates: PromptTemplates,
        files: Vec<String>,
        self_prompts: Vec<String>,
        pending: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                memory: MemorySnapshot::default(),
                headers: MemoryPromptHeaders::default(),
                templates: PromptTemplates::default(),
                files: vec![],
                self_prompts: vec!["{self-prompt-from-Wisp: continue}".into()],
                pending: vec![],
            }
        }

        fn ctx(&self) -> PromptContext<'_> {
            PromptContext {
                system_prompt: "You are {NAME}.",
                memory: &self.memory,
                headers: &self.headers,
                chat_log: "",
                templates: &self.templates,
                files: &self.files,
                input_injector: "",
                now: Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
                user_status: UserStatus::Online,
                self_prompts: &self.self_prompts,
                feedback: "",
                pending_messages: &self.pending,
                agent_name: "Wisp",
                user_name: "Ada",
            }
        }
    }

    #[test]
    fn minimal_prompt() {
        let f = Fixture::new();
        let prompt = assemble(&f.ctx());
        assert_eq!(
            prompt.dynamic,
            "{terminal contains the following files : none}\n\
             {Terminal: the-current-time-is[[time : 02:07:09 PM][day: 05][month: 03][year: 2024]]}\n\
             {Terminal: the-users-online-status-is-currently : online}\n\
             {self-prompt-from-Wisp: continue}\n\
             {Wisp-starts-thinking}"
        );
        assert_eq!(prompt.full, format!("You are Wisp.\n{}", prompt.dynamic));
    }

    #[test]
    fn memory_tiers_long_term_first() {
        let mut f = Fixture::new();
        f.memory.stm = vec!["s1".into()];
        f.memory.ltm = vec!["l1".into(), "l2".into()];
        let prompt = assemble(&f.ctx());
        let system = prompt.full.split("\n{terminal").next().unwrap();
        assert_eq!(
            system,
            "You are Wisp.\n\n#wispers-long-term-memories :\n- l1\n- l2\n\n#wispers-short-term-memories :\n- s1"
        );
    }

    #[test]
    fn chat_log_under_header() {
        let f = Fixture::new();
        let mut ctx = f.ctx();
        ctx.chat_log = "Ada: hi\nWisp: hello";
        let prompt = assemble(&ctx);
        assert!(prompt.full.contains("#this-is-Wisp-recent-chat-history:\nAda: hi\nWisp: hello"));
        assert!(!prompt.dynamic.contains("recent-chat-history"));
    }

    #[test]
    fn dynamic_order_with_everything() {
        let mut f = Fixture::new();
        f.files = vec!["a.txt".into(), "b.txt".into()];
        f.pending = vec!["hello".into(), "again".into()];
        let mut ctx = f.ctx();
        ctx.input_injector = "INJECT";
        ctx.feedback = "{Terminal: file-created[a.txt]}";
        ctx.user_status = UserStatus::Away;
        let dynamic = assemble(&ctx).dynamic;
        let lines: Vec<&str> = dynamic.lines().collect();

        assert_eq!(lines[0], "{terminal contains the following files : a.txt, b.txt}");
        assert_eq!(lines[1], "INJECT");
        assert!(lines[2].starts_with("{Terminal: the-current-time-is"));
        assert!(lines[3].ends_with(": away}"));
        assert_eq!(lines[4], "{self-prompt-from-Wisp: continue}");
        assert_eq!(lines[5], "{Terminal: file-created[a.txt]}");
        assert_eq!(lines[6], "{Ada-says: hello again}");
        assert_eq!(lines[7], "{Wisp-starts-thinking}");
    }

    #[test]
    fn empty_templates_are_dropped() {
        let mut f = Fixture::new();
        let mut map = f.templates.as_map().clone();
        let _ = map.insert(keys::TIME_INJECTION.into(), String::new());
        f.templates = PromptTemplates::from_map(map);
        let dynamic = assemble(&f.ctx()).dynamic;
        assert!(!dynamic.contains("current-time"));
        assert!(!dynamic.contains("\n\n"));
    }

    #[test]
    fn multiple_self_prompts_each_on_a_line() {
        let mut f = Fixture::new();
        f.self_prompts = vec!["{a}".into(), String::new(), "{b}".into()];
        assert!(assemble(&f.ctx()).dynamic.contains("{a}\n{b}"));
    }
}
