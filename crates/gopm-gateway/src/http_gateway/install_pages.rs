//! HTML pages rendered by the OAuth callback.

pub(super) fn render_install_success_page(
    workspace_name: &str,
    agent_user_id: &str,
    installed_at: &str,
    scope: &str,
) -> String {
    format!(
        r#"<html>
  <head><title>goPM Agent Installed</title></head>
  <body style="font-family: Arial, sans-serif; padding: 40px; text-align: center;">
    <h1 style="color: #28a745;">✅ goPM Agent Installed Successfully!</h1>

    <div style="background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px auto; text-align: left; max-width: 600px;">
      <h3>🤖 Agent Details</h3>
      <p><strong>Workspace:</strong> {workspace_name}</p>
      <p><strong>Agent ID:</strong> {agent_user_id}</p>
      <p><strong>Installed:</strong> {installed_at}</p>
      <p><strong>Permissions:</strong> {scope}</p>
    </div>

    <div style="background: #e3f2fd; padding: 20px; border-radius: 8px; margin: 20px auto; max-width: 600px;">
      <h3>🚀 Getting Started</h3>
      <p>Your goPM agent is now active in your Linear workspace!</p>
      <ul style="text-align: left;">
        <li><strong>@mention</strong> the agent in any issue or comment for PM guidance</li>
        <li><strong>Assign issues</strong> to the agent for automated analysis</li>
        <li><strong>Collaborate</strong> with the agent like any team member</li>
      </ul>

      <p style="margin-top: 20px;">
        <strong>Try it now:</strong> Go to any Linear issue and type <code>@goPM help me analyze this epic</code>
      </p>
    </div>

    <p>
      <a href="https://linear.app" style="background: #5e6ad2; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">
        Go to Linear
      </a>
    </p>
  </body>
</html>
"#
    )
}

pub(super) fn render_install_failure_page(error: &str, detail: &str) -> String {
    format!(
        r#"<html>
  <head><title>goPM Installation Failed</title></head>
  <body style="font-family: Arial, sans-serif; padding: 40px; text-align: center;">
    <h1 style="color: #dc3545;">❌ Installation Failed</h1>
    <p><strong>Error:</strong> {error}</p>
    <p>{detail}</p>
    <p><a href="/oauth/install">Try Again</a></p>
  </body>
</html>
"#
    )
}
