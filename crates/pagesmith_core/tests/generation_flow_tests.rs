//! End-to-end tests of the generation and deploy flow against a scripted
//! backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pagesmith_codegen::{
    CodeLayout, FixedRouter, GenEvent, ScriptedBackend, ToolFileWrite,
};
use pagesmith_core::{
    ConcurrencyPolicy, CoreError, PagesmithConfig, StreamEvent, TargetService,
};
use pagesmith_deploy::{DeployResult, LocalObjectStore, ScreenshotService, Screenshotter};
use pagesmith_session::MessageKind;
use tempfile::TempDir;
use tokio_stream::StreamExt;

const OWNER: i64 = 100;

fn test_config(root: &Path) -> PagesmithConfig {
    PagesmithConfig {
        data_root: root.join("data"),
        output_root: root.join("code_output"),
        deploy_root: root.join("code_deploy"),
        deploy_host: "https://host".to_string(),
        screenshot_root: root.join("uploads"),
        screenshot_base_url: "https://cdn".to_string(),
        concurrency: ConcurrencyPolicy::Allow,
        ..Default::default()
    }
}

fn service(temp: &TempDir, backend: ScriptedBackend, layout: CodeLayout) -> TargetService {
    TargetService::new(
        test_config(temp.path()),
        Arc::new(backend),
        Arc::new(FixedRouter(layout)),
        None,
    )
}

async fn collect(
    mut stream: tokio_stream::wrappers::ReceiverStream<StreamEvent>,
) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn multi_file_generation_end_to_end() {
    let temp = TempDir::new().unwrap();
    let raw = "```html\n<html><body>shop</body></html>\n```\n\
               ```css\nbody { color: teal; }\n```\n\
               ```js\nconsole.log('shop');\n```";
    let backend = ScriptedBackend::new().with_text(&[
        "```html\n<html><body>shop</body></html>\n```\n",
        "```css\nbody { color: teal; }\n```\n",
        "```js\nconsole.log('shop');\n```",
    ]);
    let service = service(&temp, backend, CodeLayout::MultiFile);

    let target = service.create_target("a shop page", OWNER).await.unwrap();
    assert_eq!(target.layout, CodeLayout::MultiFile);

    let stream = service
        .chat_to_gen_code(target.id, "make it teal", OWNER)
        .await
        .unwrap();
    let events = collect(stream).await;

    // Chunks pass through in production order, then a single Done.
    let chunks: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, raw);
    let done_dir = match events.last().unwrap() {
        StreamEvent::Done { output_dir } => output_dir.clone(),
        other => panic!("expected Done, got {other:?}"),
    };
    assert!(done_dir.ends_with(&format!("multi_file_{}", target.id)));

    let dir = Path::new(&done_dir);
    assert_eq!(
        std::fs::read_to_string(dir.join("index.html")).unwrap(),
        "<html><body>shop</body></html>"
    );
    assert!(dir.join("style.css").exists());
    assert!(dir.join("script.js").exists());

    // History: user message then the raw assistant text.
    let history = service.list_history(target.id, OWNER, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, MessageKind::User);
    assert_eq!(history[0].content, "make it teal");
    assert_eq!(history[1].kind, MessageKind::Assistant);
    assert_eq!(history[1].content, raw);
}

#[tokio::test]
async fn backend_failure_mid_stream_preserves_partial_output() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend::new().add_script(vec![
        GenEvent::Chunk("<p>par".to_string()),
        GenEvent::Failed("backend unavailable".to_string()),
    ]);
    let service = service(&temp, backend, CodeLayout::Html);
    let target = service.create_target("a page", OWNER).await.unwrap();

    let stream = service
        .chat_to_gen_code(target.id, "go", OWNER)
        .await
        .unwrap();
    let events = collect(stream).await;

    // Partial chunk followed by the terminal error; nothing retracted.
    assert!(matches!(&events[0], StreamEvent::Chunk { content } if content == "<p>par"));
    assert!(matches!(
        events.last().unwrap(),
        StreamEvent::Error { message } if message.contains("backend unavailable")
    ));

    // History holds the user message and a distinct error entry, no
    // assistant success entry.
    let history = service.list_history(target.id, OWNER, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, MessageKind::User);
    assert_eq!(history[1].kind, MessageKind::Error);
}

#[tokio::test]
async fn parse_gap_surfaces_as_content_error() {
    let temp = TempDir::new().unwrap();
    // Only an html block: css and js stay empty and fail save validation.
    let backend = ScriptedBackend::new().with_text(&["```html\n<p>x</p>\n```"]);
    let service = service(&temp, backend, CodeLayout::MultiFile);
    let target = service.create_target("p", OWNER).await.unwrap();

    let stream = service
        .chat_to_gen_code(target.id, "go", OWNER)
        .await
        .unwrap();
    let events = collect(stream).await;

    assert!(matches!(
        events.last().unwrap(),
        StreamEvent::Error { message } if message.contains("css")
    ));
    // Validation ran before any write.
    assert!(!temp
        .path()
        .join("code_output")
        .join(format!("multi_file_{}", target.id))
        .exists());
}

#[tokio::test]
async fn vue_project_tool_calls_build_and_deploy() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend::new().add_script(vec![
        GenEvent::ToolCall(ToolFileWrite {
            path: "package.json".into(),
            content: "{}".into(),
        }),
        GenEvent::ToolCall(ToolFileWrite {
            path: "src/main.js".into(),
            content: "1;".into(),
        }),
        GenEvent::Completed,
    ]);

    let mut config = test_config(temp.path());
    config.build.steps = vec![vec![
        "sh".into(),
        "-c".into(),
        "mkdir -p dist && cp src/main.js dist/main.js".into(),
    ]];
    let service = TargetService::new(
        config,
        Arc::new(backend),
        Arc::new(FixedRouter(CodeLayout::VueProject)),
        None,
    );

    let target = service.create_target("a vue app", OWNER).await.unwrap();
    let stream = service
        .chat_to_gen_code(target.id, "build it", OWNER)
        .await
        .unwrap();
    let events = collect(stream).await;

    let written: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::FileWritten { path } => Some(path.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(written, ["package.json", "src/main.js"]);
    assert!(matches!(events.last().unwrap(), StreamEvent::Done { .. }));

    // The synthetic assistant summary names the written files.
    let history = service.list_history(target.id, OWNER, 10).await.unwrap();
    assert!(history[1].content.contains("src/main.js"));

    // Deploy builds first and publishes dist/ only.
    let url = service.deploy_target(target.id, OWNER).await.unwrap();
    let key = url
        .trim_start_matches("https://host/")
        .trim_end_matches('/');
    let slot = temp.path().join("code_deploy").join(key);
    assert!(slot.join("main.js").exists());
    assert!(!slot.join("src").exists());
}

#[tokio::test]
async fn deploy_key_is_stable_across_redeploys() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend::new()
        .with_text(&["<html>v1</html>"])
        .with_text(&["<html>v2</html>"]);
    let service = service(&temp, backend, CodeLayout::Html);
    let target = service.create_target("p", OWNER).await.unwrap();

    let stream = service.chat_to_gen_code(target.id, "v1", OWNER).await.unwrap();
    collect(stream).await;
    let first_url = service.deploy_target(target.id, OWNER).await.unwrap();

    let stream = service.chat_to_gen_code(target.id, "v2", OWNER).await.unwrap();
    collect(stream).await;
    let second_url = service.deploy_target(target.id, OWNER).await.unwrap();

    assert_eq!(first_url, second_url);
    let key = first_url
        .trim_start_matches("https://host/")
        .trim_end_matches('/');
    let slot = temp.path().join("code_deploy").join(key);
    assert_eq!(
        std::fs::read_to_string(slot.join("index.html")).unwrap(),
        "<html>v2</html>"
    );
}

#[tokio::test]
async fn deploy_without_generated_code_is_rejected() {
    let temp = TempDir::new().unwrap();
    let service = service(&temp, ScriptedBackend::new(), CodeLayout::Html);
    let target = service.create_target("p", OWNER).await.unwrap();

    assert!(matches!(
        service.deploy_target(target.id, OWNER).await,
        Err(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn ownership_is_enforced() {
    let temp = TempDir::new().unwrap();
    let service = service(&temp, ScriptedBackend::new(), CodeLayout::Html);
    let target = service.create_target("p", OWNER).await.unwrap();
    let stranger = OWNER + 1;

    assert!(matches!(
        service.chat_to_gen_code(target.id, "hi", stranger).await,
        Err(CoreError::Unauthorized(_))
    ));
    assert!(matches!(
        service.deploy_target(target.id, stranger).await,
        Err(CoreError::Unauthorized(_))
    ));
    assert!(matches!(
        service.delete_target(target.id, stranger).await,
        Err(CoreError::Unauthorized(_))
    ));

    assert!(matches!(
        service.chat_to_gen_code(9999, "hi", OWNER).await,
        Err(CoreError::NotFound(9999))
    ));
}

#[tokio::test]
async fn delete_target_cascades_history() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend::new().with_text(&["<p>x</p>"]);
    let service = service(&temp, backend, CodeLayout::Html);
    let target = service.create_target("p", OWNER).await.unwrap();

    let stream = service.chat_to_gen_code(target.id, "go", OWNER).await.unwrap();
    collect(stream).await;

    service.delete_target(target.id, OWNER).await.unwrap();
    assert!(matches!(
        service.get_target(target.id, OWNER),
        Err(CoreError::NotFound(_))
    ));
    assert!(!temp
        .path()
        .join("data")
        .join("history")
        .join(target.id.to_string())
        .exists());
}

struct FixedShot;

#[async_trait::async_trait]
impl Screenshotter for FixedShot {
    async fn capture(&self, _url: &str) -> DeployResult<Vec<u8>> {
        Ok(vec![0xAB])
    }
}

#[tokio::test]
async fn deploy_triggers_detached_screenshot() {
    let temp = TempDir::new().unwrap();
    let backend = ScriptedBackend::new().with_text(&["<p>x</p>"]);
    let screenshots = Arc::new(ScreenshotService::new(
        Box::new(FixedShot),
        Box::new(LocalObjectStore::new(temp.path().join("uploads"), "https://cdn")),
    ));
    let service = TargetService::new(
        test_config(temp.path()),
        Arc::new(backend),
        Arc::new(FixedRouter(CodeLayout::Html)),
        Some(screenshots),
    );

    let target = service.create_target("p", OWNER).await.unwrap();
    let stream = service.chat_to_gen_code(target.id, "go", OWNER).await.unwrap();
    collect(stream).await;
    service.deploy_target(target.id, OWNER).await.unwrap();

    // The screenshot task is fire-and-forget; poll briefly for the cover.
    let mut cover = None;
    for _ in 0..50 {
        let current = service.get_target(target.id, OWNER).unwrap();
        if current.cover_url.is_some() {
            cover = current.cover_url;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let cover = cover.expect("cover url never recorded");
    assert!(cover.starts_with("https://cdn/screenshots/"));
}
