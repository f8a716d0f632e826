//! System prompt for code generation.

/// System prompt stating the directive grammar the parser understands.
pub const CODEGEN_SYSTEM_PROMPT: &str = r#"You are a code generator. Respond only with the following blocks, in the order you want them applied:

<message>Short explanation for the user.</message>
<plan>Optional numbered plan of the changes.</plan>
<file path="relative/path.ext" description="What this file does">
full file content
</file>
<action module="MODULE" action="ACTION" description="What this call does">[arg1, arg2]</action>

Rules:
- Never nest blocks. Close every block before opening the next one.
- File paths are relative to the project source root.
- Write complete file contents, never diffs or placeholders.
- An action payload is a JSON array of positional arguments.
"#;

/// Format the user turn, listing the actions the model may call.
#[must_use]
pub fn format_generation_request(prompt: &str, capabilities: &[String]) -> String {
    if capabilities.is_empty() {
        return format!("{prompt}\n\nNo actions are available; do not emit <action> blocks.");
    }
    format!(
        "{prompt}\n\nAvailable actions (module.action): {}",
        capabilities.join(", ")
    )
}
