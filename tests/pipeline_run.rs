// tests/pipeline_run.rs
//
// Whole runs against fake research, image and channel collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use newsmaker::config::PipelineConfig;
use newsmaker::ingest::{ImageSource, NewsRequest, NewsSource, COLLECTION_MAX_TOKENS};
use newsmaker::notify::{DeliveryLimits, Publisher, Transport};
use newsmaker::parse::Verdict;
use newsmaker::pipeline::{ImageStatus, Pipeline, RunOutcome};

const FRESH: &str = "📜 Закон о такси от 01.06.2025 [1]\n\n💬 КОММЕНТАРИЙ: Водителям стало проще.\n\nИСТОЧНИКИ:\n[1] https://a.ru/x";
const STALE: &str = "📜 Закон о пособиях от 01.05.2025\n\nПособия выросли.";
const BATCH: &str = "ПРИОРИТЕТ 2 - ОЧЕНЬ ВАЖНО:
📜 Вычет за спорт
Семьи получат вычет.

ПРИОРИТЕТ 1 - КРИТИЧЕСКИ ВАЖНО:
📜 Штрафы для водителей
Штрафы выросли вдвое.
";

/// Replies from `single` in order (the last one repeats); `BATCH` for collection requests.
struct FakeNews {
    single: Vec<&'static str>,
    prompts: Mutex<Vec<String>>,
}

impl FakeNews {
    fn new(single: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            single,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl NewsSource for FakeNews {
    async fn fetch(&self, req: &NewsRequest) -> Result<String> {
        if req.max_tokens == COLLECTION_MAX_TOKENS {
            return Ok(BATCH.to_string());
        }
        let mut prompts = self.prompts.lock().unwrap();
        let n = prompts.len().min(self.single.len() - 1);
        prompts.push(req.prompt.clone());
        Ok(self.single[n].to_string())
    }

    fn name(&self) -> &'static str {
        "fake-news"
    }
}

struct FakeImages {
    ok: bool,
}

#[async_trait::async_trait]
impl ImageSource for FakeImages {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        if self.ok {
            Ok(vec![0x89, b'P', b'N', b'G'])
        } else {
            Err(anyhow!("image quota exceeded"))
        }
    }

    fn name(&self) -> &'static str {
        "fake-images"
    }
}

#[derive(Default)]
struct Channel {
    sent: Mutex<Vec<String>>,
    /// Time each send takes, so concurrent publishes overlap.
    latency: Option<Duration>,
}

impl Channel {
    fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for Channel {
    async fn send_text(&self, text: &str) -> Result<()> {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        self.sent.lock().unwrap().push(format!("text:{text}"));
        Ok(())
    }

    async fn send_photo(&self, _image: &[u8], caption: Option<&str>) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(format!("photo:{}", caption.unwrap_or("-")));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

fn now() -> DateTime<Utc> {
    // 10:00 Moscow time
    Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap()
}

fn pipeline(news: Arc<FakeNews>, channel: Arc<Channel>, settings: PipelineConfig) -> Pipeline {
    let publisher = Arc::new(Publisher::new(channel, DeliveryLimits::default()));
    Pipeline::new(
        news,
        publisher,
        settings,
        FixedOffset::east_opt(3 * 3600).unwrap(),
    )
}

#[tokio::test]
async fn single_run_publishes_fresh_reply_with_image() {
    let news = FakeNews::new(vec![FRESH]);
    let channel = Arc::new(Channel::default());
    let p = pipeline(news.clone(), channel.clone(), PipelineConfig::default())
        .with_images(Arc::new(FakeImages { ok: true }));

    match p.run_single(now()).await.unwrap() {
        RunOutcome::Published {
            report,
            freshness,
            image,
        } => {
            assert_eq!(report.parts_sent, 1);
            assert_eq!(freshness.verdict, Verdict::Fresh);
            assert_eq!(image, ImageStatus::Attached);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("photo:<b>📜 Закон о такси"), "{}", sent[0]);
    assert!(sent[0].contains(r#"<a href="https://a.ru/x">[1]</a>"#));
    assert_eq!(news.prompts().len(), 1);
}

#[tokio::test]
async fn image_failure_degrades_to_text_post() {
    let news = FakeNews::new(vec![FRESH]);
    let channel = Arc::new(Channel::default());
    let p = pipeline(news, channel.clone(), PipelineConfig::default())
        .with_images(Arc::new(FakeImages { ok: false }));

    let RunOutcome::Published { image, .. } = p.run_single(now()).await.unwrap() else {
        panic!("expected a published outcome");
    };
    assert!(matches!(image, ImageStatus::Failed(ref e) if e.contains("image quota exceeded")));
    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("text:"));
}

#[tokio::test]
async fn stale_reply_is_published_unless_rejected() {
    let news = FakeNews::new(vec![STALE]);
    let channel = Arc::new(Channel::default());
    let p = pipeline(news.clone(), channel.clone(), PipelineConfig::default());

    let RunOutcome::Published { freshness, image, .. } = p.run_single(now()).await.unwrap() else {
        panic!("expected a published outcome");
    };
    assert_eq!(freshness.verdict, Verdict::Stale);
    assert_eq!(image, ImageStatus::Disabled);
    assert_eq!(news.prompts().len(), 1);
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn stale_reply_is_refetched_with_date_feedback() {
    let news = FakeNews::new(vec![STALE, FRESH]);
    let channel = Arc::new(Channel::default());
    let settings = PipelineConfig {
        skip_stale: true,
        ..PipelineConfig::default()
    };
    let p = pipeline(news.clone(), channel.clone(), settings);

    let outcome = p.run_single(now()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Published { .. }));

    let prompts = news.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("Предыдущий ответ"));
    assert!(prompts[1].contains("01.05.2025"), "{}", prompts[1]);
    assert!(channel.sent()[0].contains("Закон о такси"));
}

#[tokio::test]
async fn persistently_stale_replies_are_skipped() {
    let news = FakeNews::new(vec![STALE]);
    let channel = Arc::new(Channel::default());
    let settings = PipelineConfig {
        skip_stale: true,
        ..PipelineConfig::default()
    };
    let p = pipeline(news.clone(), channel.clone(), settings);

    let outcome = p.run_single(now()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::SkippedStale { .. }));
    assert_eq!(news.prompts().len(), 2);
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn empty_reply_is_an_error() {
    let news = FakeNews::new(vec!["   \n"]);
    let p = pipeline(news, Arc::new(Channel::default()), PipelineConfig::default());
    let err = p.run_single(now()).await.unwrap_err();
    assert_eq!(err.kind(), "empty_response");
}

#[tokio::test]
async fn daily_queue_publishes_in_priority_order() {
    let news = FakeNews::new(vec![FRESH]);
    let channel = Arc::new(Channel::default());
    let p = pipeline(news, channel.clone(), PipelineConfig::default());

    assert_eq!(p.collect_daily(now()).await.unwrap(), 2);
    let status = p.queue_status();
    assert_eq!(status.pending, 2);
    assert_eq!(status.next_title.as_deref(), Some("Штрафы для водителей"));

    assert!(p.publish_next().await.unwrap().is_some());
    assert!(p.publish_next().await.unwrap().is_some());
    assert!(p.publish_next().await.unwrap().is_none());

    let sent = channel.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("Штрафы для водителей"));
    assert!(sent[1].contains("Вычет за спорт"));
    assert_eq!(p.queue_status().published, 2);
}

#[tokio::test]
async fn concurrent_publish_next_never_posts_an_item_twice() {
    let news = FakeNews::new(vec![FRESH]);
    let channel = Arc::new(Channel::slow(Duration::from_millis(50)));
    let p = pipeline(news, channel.clone(), PipelineConfig::default());
    assert_eq!(p.collect_daily(now()).await.unwrap(), 2);

    // a schedule slot and a manual trigger firing together
    let (a, b) = tokio::join!(p.publish_next(), p.publish_next());
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert!(p.publish_next().await.unwrap().is_none());

    let sent = channel.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent.iter().filter(|s| s.contains("Штрафы для водителей")).count(), 1);
    assert_eq!(sent.iter().filter(|s| s.contains("Вычет за спорт")).count(), 1);
    assert_eq!(p.queue_status().published, 2);
}

#[tokio::test]
async fn concurrent_publish_next_on_last_item_leaves_one_caller_empty() {
    let news = FakeNews::new(vec![FRESH]);
    let channel = Arc::new(Channel::slow(Duration::from_millis(50)));
    let p = pipeline(news, channel.clone(), PipelineConfig::default());
    p.collect_daily(now()).await.unwrap();
    p.publish_next().await.unwrap();

    let (a, b) = tokio::join!(p.publish_next(), p.publish_next());
    let published = [a.unwrap(), b.unwrap()].iter().filter(|r| r.is_some()).count();
    assert_eq!(published, 1);
    assert_eq!(channel.sent().len(), 2);
}
