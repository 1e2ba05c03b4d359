//! End-to-end conversation turns through the command interpreter.

use std::sync::Arc;

use async_trait::async_trait;
use workbench::conversation::Role;
use workbench::sandbox::{ContainerRuntime, ContainerSpec, RunOutput, SandboxError};
use workbench::{ExecutionEngine, Intent, NewProject, Project, Workbench, WorkbenchConfig};

/// Runtime whose containers print a fixed line and exit.
#[derive(Debug)]
struct EchoRuntime;

#[async_trait]
impl ContainerRuntime for EchoRuntime {
    async fn ping(&self) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        Ok(spec.name.clone())
    }

    async fn run(&self, _id: &str, _output_cap: usize) -> Result<RunOutput, SandboxError> {
        Ok(RunOutput {
            stdout: b"ran ok\n".to_vec(),
            ..Default::default()
        })
    }

    async fn kill(&self, _id: &str) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn remove(&self, _id: &str) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn is_running(&self, _id: &str) -> Result<bool, SandboxError> {
        Ok(false)
    }
}

struct Session {
    _dir: tempfile::TempDir,
    workbench: Workbench,
    project: Project,
    conversation_id: String,
}

impl Session {
    async fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WorkbenchConfig {
            projects_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let engine = ExecutionEngine::new(&config.sandbox, Arc::new(EchoRuntime));
        let workbench = Workbench::new(config, engine);

        let project = workbench
            .create_project(NewProject {
                name: "demo".to_string(),
                ..Default::default()
            })
            .await
            .expect("create project");
        let tool = project.files().expect("files");
        for (path, content) in files {
            tool.create(path, content).await.expect("seed file");
        }
        let conversation = workbench
            .create_conversation(&project.id, Some("chat".to_string()), None)
            .await
            .expect("create conversation");

        Self {
            _dir: dir,
            workbench,
            project,
            conversation_id: conversation.id,
        }
    }

    async fn say(&self, message: &str) -> workbench::Reply {
        self.workbench
            .send_message(&self.conversation_id, message)
            .await
            .expect("send")
    }

    async fn read(&self, path: &str) -> String {
        self.project
            .files()
            .expect("files")
            .read(path)
            .await
            .expect("read")
    }
}

// =============================================================================
// Scenario Tests
// =============================================================================

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_edit_without_directive_only_previews() {
        let session = Session::new(&[("app.py", "def foo():\n    pass\n")]).await;

        let reply = session.say("edit @app.py to rename foo to bar").await;

        assert_eq!(reply.intent, Intent::Edit);
        assert_eq!(reply.file_tags, vec!["app.py"]);
        assert!(reply.response.contains("def foo():"));
        assert!(reply.response.contains("replace \"old text\" with \"new text\""));
        assert_eq!(session.read("app.py").await, "def foo():\n    pass\n");
    }

    #[tokio::test]
    async fn test_edit_without_tags_asks_for_target() {
        let session = Session::new(&[("app.py", "x = 1\n")]).await;

        let reply = session.say("please edit the code").await;

        assert_eq!(reply.intent, Intent::Edit);
        assert!(reply.response.contains("Which file should I edit?"));
    }

    #[tokio::test]
    async fn test_replace_applies_to_each_file_independently() {
        let session = Session::new(&[
            ("app.py", "foo = 1\nprint(foo)\n"),
            ("lib.py", "value = 2\n"),
        ])
        .await;

        let reply = session
            .say("replace \"foo\" with \"bar\" in @app.py @lib.py")
            .await;

        assert_eq!(reply.intent, Intent::Replace);
        assert!(reply.response.contains("✅ app.py: replaced 2 occurrences"));
        assert!(reply.response.contains("❌ lib.py: text not found"));
        assert_eq!(session.read("app.py").await, "bar = 1\nprint(bar)\n");
        assert_eq!(session.read("lib.py").await, "value = 2\n");
    }

    #[tokio::test]
    async fn test_malformed_replace_gives_format_hint() {
        let session = Session::new(&[("app.py", "foo\n")]).await;

        let reply = session.say("replace foo with bar in @app.py").await;

        assert_eq!(reply.intent, Intent::Replace);
        assert!(reply.response.contains("couldn't parse"));
        assert_eq!(session.read("app.py").await, "foo\n");
    }

    #[tokio::test]
    async fn test_analyze_reports_counts() {
        let session = Session::new(&[(
            "app.py",
            "class A:\n    def f(self):\n        pass\n\ndef g():\n    pass\n",
        )])
        .await;

        let reply = session.say("analyze @app.py").await;

        assert_eq!(reply.intent, Intent::Analyze);
        assert!(reply.response.contains("📊 app.py: 6 lines"));
        assert!(reply.response.contains("functions: 2"));
        assert!(reply.response.contains("classes: 1"));
    }

    #[tokio::test]
    async fn test_view_reports_missing_file() {
        let session = Session::new(&[]).await;

        let reply = session.say("show @nope.txt").await;

        assert_eq!(reply.intent, Intent::View);
        assert!(reply.response.contains("❌ nope.txt: file not found"));
    }

    #[tokio::test]
    async fn test_run_fenced_block() {
        let session = Session::new(&[]).await;

        let reply = session.say("run this\n```python\nprint('ok')\n```").await;

        assert_eq!(reply.intent, Intent::Run);
        assert!(reply.response.contains("(python): success"));
        assert!(reply.response.contains("ran ok"));
    }

    #[tokio::test]
    async fn test_run_tagged_script() {
        let session = Session::new(&[("main.py", "print('ok')\n"), ("notes.txt", "hi\n")]).await;

        let reply = session.say("run @main.py @notes.txt").await;

        assert!(reply.response.contains("▶ main.py (python): success"));
        assert!(reply.response.contains("❌ notes.txt: no runner for this file type"));
    }

    #[tokio::test]
    async fn test_fallback_lists_files() {
        let session = Session::new(&[("app.py", "x\n")]).await;

        let reply = session.say("hello there").await;

        assert_eq!(reply.intent, Intent::Fallback);
        assert!(reply.response.contains("Available files in your project"));
        assert!(reply.response.contains("app.py"));
        assert!(reply.response.contains("README.md"));
    }

    #[tokio::test]
    async fn test_fallback_with_tags_asks_for_clarification() {
        let session = Session::new(&[("app.py", "x\n")]).await;

        let reply = session.say("what about @app.py?").await;

        assert_eq!(reply.intent, Intent::Fallback);
        assert_eq!(reply.file_tags, vec!["app.py"]);
        assert!(reply.response.contains("What would you like me to do with it?"));
    }
}

// =============================================================================
// Conversation Log Tests
// =============================================================================

mod log {
    use super::*;

    #[tokio::test]
    async fn test_each_turn_appends_user_then_one_reply() {
        let session = Session::new(&[("a.txt", "hello world")]).await;

        let messages = [
            "show @a.txt",
            "show @missing.txt",
            "replace \"hello\" with \"hi\" in @a.txt",
            "replace \"hello\" with \"hi\" in @a.txt",
            "@../../etc/passwd view",
            "",
        ];
        for message in messages {
            session.say(message).await;
        }

        let conversation = session
            .workbench
            .conversations()
            .get(&session.conversation_id)
            .await
            .expect("conversation");
        assert_eq!(conversation.messages.len(), messages.len() * 2);
        for (i, pair) in conversation.messages.chunks(2).enumerate() {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[0].content, messages[i]);
            assert_eq!(pair[1].role, Role::Assistant);
            assert!(!pair[1].content.is_empty());
        }
    }

    #[tokio::test]
    async fn test_user_message_keeps_tags() {
        let session = Session::new(&[]).await;

        session.say("show @a.py, @b.py and @a.py").await;

        let conversation = session
            .workbench
            .conversations()
            .get(&session.conversation_id)
            .await
            .expect("conversation");
        assert_eq!(conversation.messages[0].file_tags, vec!["a.py", "b.py"]);
        assert!(conversation.messages[1].file_tags.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_an_error() {
        let session = Session::new(&[]).await;

        let err = session
            .workbench
            .send_message("no-such-conversation", "hello")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            workbench::InterpreterError::ConversationNotFound(_)
        ));
    }
}
