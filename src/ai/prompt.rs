//! Prompt construction for AI review requests.

use super::sampling::{Message, SamplingRequest};
use super::{ContentType, Focus};

/// Fixed reply shape requested from the model.
pub const RESPONSE_SHAPE: &str = r#"{
  "passed": true | false,
  "results": [
    {
      "ruleId": "short-kebab-case-id",
      "isValid": false,
      "message": "what is wrong",
      "severity": "error" | "warning" | "info",
      "category": "security" | "performance" | "best-practice" | "compliance" | "optimization",
      "location": "line 3",
      "fixSuggestion": "how to fix it",
      "confidence": 0.0-1.0
    }
  ],
  "summary": "one paragraph"
}"#;

const SYSTEM_PROMPT: &str = "You are a meticulous reviewer of container build and deployment artifacts. \
Reply with a single JSON object and nothing else.";

fn content_instructions(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Dockerfile => {
            "Review the following Dockerfile. Check base image pinning, the user the container runs as, \
layer ordering and cache use, image size, secrets in build arguments or environment, \
and how the container is started and health-checked."
        }
        ContentType::Kubernetes => {
            "Review the following Kubernetes manifest. Check resource requests and limits, probes, \
security contexts, image tags, label and selector consistency, and service exposure."
        }
        ContentType::Security => {
            "Perform a security review of the following content. Look for privilege escalation, \
exposed credentials, unpinned or untrusted sources, unnecessary network exposure, \
and missing isolation."
        }
        ContentType::General => {
            "Review the following configuration content for correctness, maintainability and risk."
        }
    }
}

fn focus_instructions(focus: Focus) -> &'static str {
    match focus {
        Focus::Security => "Concentrate on security issues. Mention other problems only if they are severe.",
        Focus::Performance => {
            "Concentrate on performance: build time, image size, startup time and resource usage."
        }
        Focus::BestPractices => {
            "Concentrate on established best practices and maintainability."
        }
        Focus::All => "Cover security, performance and best practices.",
    }
}

/// The user message for a structured critique.
pub fn validation_prompt(content: &str, content_type: ContentType, focus: Focus) -> String {
    format!(
        "{}\n{}\n\nRespond with JSON in exactly this shape:\n{}\n\n\
List one entry per issue found, with isValid false. Use isValid true only for notable checks that passed.\n\n\
Content ({}):\n```\n{}\n```",
        content_instructions(content_type),
        focus_instructions(focus),
        RESPONSE_SHAPE,
        content_type,
        content
    )
}

/// A sampling request asking for a structured critique.
pub fn validation_request(
    content: &str,
    content_type: ContentType,
    focus: Focus,
    max_tokens: u32,
    temperature: f32,
    model: Option<String>,
) -> SamplingRequest {
    SamplingRequest {
        messages: vec![Message::user(validation_prompt(content, content_type, focus))],
        system: Some(SYSTEM_PROMPT.to_string()),
        max_tokens,
        temperature,
        model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_varies_by_type_and_focus() {
        let docker = validation_prompt("FROM x", ContentType::Dockerfile, Focus::Security);
        let k8s = validation_prompt("kind: Pod", ContentType::Kubernetes, Focus::Performance);

        assert!(docker.contains("Dockerfile"));
        assert!(docker.contains("Concentrate on security"));
        assert!(k8s.contains("Kubernetes manifest"));
        assert!(k8s.contains("performance"));
        assert!(docker.contains("\"results\""));
        assert!(docker.ends_with("FROM x\n```"));
    }

    #[test]
    fn test_request_has_system_prompt() {
        let request = validation_request("x", ContentType::General, Focus::All, 100, 0.1, None);
        assert_eq!(request.messages.len(), 1);
        assert!(request.system.as_deref().unwrap().contains("JSON"));
        assert_eq!(request.max_tokens, 100);
    }
}
