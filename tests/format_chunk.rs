// tests/format_chunk.rs
//
// Reply → formatted HTML → transport-sized chunks, checked on the properties the channel needs:
// every chunk within the limit, no chunk with an open or split tag, nothing lost on the way.

use newsmaker::parse::{extract_sources, ExtractedContent};
use newsmaker::render::markup::{char_len, is_balanced, strip_tags};
use newsmaker::render::{chunk_message, format_message};

fn assert_transport_safe(chunks: &[String], max: usize) {
    for c in chunks {
        assert!(char_len(c) <= max, "chunk over limit ({}): {c}", char_len(c));
        assert!(is_balanced(c), "unbalanced chunk: {c}");
        assert!(!c.trim().is_empty());
    }
}

#[test]
fn reply_end_to_end() {
    let raw = "📜 Закон о самозанятых [1]\n\n💬 КОММЕНТАРИЙ ЮРИСТА: Налог <5% & без отчётов [2].\n\nИСТОЧНИКИ:\n[1] https://a.ru/x?a=1&b=2\n[2] https://b.ru/y";
    let msg = format_message(&extract_sources(raw));
    assert_eq!(
        msg,
        concat!(
            r#"<b>📜 Закон о самозанятых <a href="https://a.ru/x?a=1&amp;b=2">[1]</a></b>"#,
            "\n\n<b>💬 КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА:</b>\n",
            r#"Налог &lt;5% &amp; без отчётов <a href="https://b.ru/y">[2]</a>."#
        )
    );
    assert_eq!(chunk_message(&msg, 4000), vec![msg.clone()]);
}

#[test]
fn formatting_twice_is_a_no_op() {
    let content = ExtractedContent::new(
        "📜 Заголовок [1]\n\n💬 КОММЕНТАРИЙ: мнение & вывод [1]\n\nИтог без ссылок [3]",
        vec!["https://a.ru/?q=1&r=2".to_string()],
    );
    let once = format_message(&content);
    let twice = format_message(&ExtractedContent::new(once.clone(), content.sources.clone()));
    assert_eq!(once, twice);
}

#[test]
fn flat_reply_is_split_into_paragraphs() {
    let sentence = "Водителям такси разрешили работать без лицензии в ночное время";
    let body = format!(
        "📜 Закон о такси [1] {sentence}. {sentence}. {sentence}. 💬 КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА: Пассажиры рады. ИСТОЧНИКИ: нет"
    );
    let msg = format_message(&ExtractedContent::new(body, vec!["https://a.ru".into()]));
    assert!(msg.contains("\n\n"), "{msg}");
    assert!(msg.contains("\n\n<b>💬 КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА:</b>"), "{msg}");
    assert!(msg.contains("\n\nИСТОЧНИКИ:"), "{msg}");
}

#[test]
fn paragraphs_pack_and_rejoin_losslessly() {
    let msg = (0..12)
        .map(|i| format!(r#"Абзац {i} со ссылкой <a href="https://a.ru/{i}">[1]</a> и текстом."#))
        .collect::<Vec<_>>()
        .join("\n\n");
    let chunks = chunk_message(&msg, 120);
    assert!(chunks.len() > 1);
    assert_transport_safe(&chunks, 120);
    assert_eq!(chunks.join("\n\n"), msg);
}

#[test]
fn long_paragraph_splits_between_sentences_not_inside_links() {
    let para = (0..20)
        .map(|i| format!(r#"Пункт {i} <a href="https://a.ru/{i}">[{i}]</a> важен."#))
        .collect::<Vec<_>>()
        .join(" ");
    let chunks = chunk_message(&para, 150);
    assert!(chunks.len() > 1);
    assert_transport_safe(&chunks, 150);
    let rebuilt: String = chunks.join(" ");
    assert_eq!(strip_tags(&rebuilt), strip_tags(&para));
}

#[test]
fn oversized_bold_sentence_is_truncated_without_dangling_tag() {
    let msg = format!("<b>{}</b>", "слово ".repeat(60).trim_end());
    let chunks = chunk_message(&msg, 100);
    assert_eq!(chunks.len(), 1);
    assert_transport_safe(&chunks, 100);
    assert!(chunks[0].ends_with("..."));
    assert!(!chunks[0].contains("<b"));
}

// Degenerate input: a message that already fits comes back unchanged as the only element,
// even when it is empty. Delivery planning drops blank chunks before sending.
#[test]
fn empty_message_is_returned_unchanged() {
    assert_eq!(chunk_message("", 4000), vec![String::new()]);
    let plan = newsmaker::notify::plan_delivery("", false, &Default::default());
    assert!(plan.is_empty());
}

#[test]
fn every_chunk_fits_a_small_limit() {
    let msg = "Первое длинное предложение. Второе длинное предложение.\n\nТретий абзац текста.";
    for limit in [10, 12, 20] {
        let chunks = chunk_message(msg, limit);
        assert!(!chunks.is_empty());
        assert_transport_safe(&chunks, limit);
    }
}
