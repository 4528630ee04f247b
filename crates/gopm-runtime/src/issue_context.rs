//! Issue context assembled for prompts and welcome messages.

use gopm_linear::IssueSnapshot;

/// Everything the assistant prompt and the welcome composer need to know
/// about an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueContext {
    pub issue_title: String,
    pub issue_description: String,
    pub team: String,
    pub state: String,
    pub project: Option<ProjectContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContext {
    pub name: String,
    pub description: String,
    pub content: String,
}

impl IssueContext {
    pub fn from_snapshot(snapshot: &IssueSnapshot) -> Self {
        Self {
            issue_title: snapshot.title.clone(),
            issue_description: snapshot.description.clone(),
            team: snapshot.team_name.clone(),
            state: snapshot.state_name.clone(),
            project: snapshot.project.as_ref().map(|project| ProjectContext {
                name: project.name.clone(),
                description: project.description.clone(),
                content: if project.content.is_empty() {
                    project.description.clone()
                } else {
                    project.content.clone()
                },
            }),
        }
    }

    /// Project section of the prompt; issues without a project get a fixed
    /// placeholder line.
    pub fn project_context_text(&self) -> String {
        match &self.project {
            None => "No project associated with this issue".to_string(),
            Some(project) => format!(
                "- Name: {}\n- Description: {}\n- Content: {}",
                or_na(&project.name),
                or_na(&project.description),
                or_na(&project.content)
            ),
        }
    }
}

pub(crate) fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
