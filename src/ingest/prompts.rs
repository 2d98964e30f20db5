// src/ingest/prompts.rs
//! Prompt texts for the research and image services.

use chrono::{Datelike, Duration, NaiveDate};
use sha2::{Digest, Sha256};

use super::{NewsRequest, COLLECTION_MAX_TOKENS, SINGLE_MAX_TOKENS};
use crate::parse::dates::MONTHS_GENITIVE;
use crate::parse::TITLE_GLYPH;

/// Words that mark a line as worth illustrating.
const COMIC_KEYWORDS: [&str; 6] = ["штраф", "налог", "закон", "запрет", "льгота", "пособие"];
const COMIC_CONTEXT_LINES: usize = 3;

pub const COMIC_STYLES: [&str; 3] = [
    "photorealistic digital art, dramatic lighting, 4-panel comic layout",
    "realistic 3D render, expressive characters, soft studio light",
    "cinematic photo style, muted colors, clean panel borders",
];

/// `"15 марта"`.
pub fn russian_day_month(date: NaiveDate) -> String {
    let month = MONTHS_GENITIVE[date.month0() as usize];
    format!("{} {month}", date.day())
}

pub fn system_prompt() -> String {
    "Ты опытный юрист-практик, который следит за изменениями российского законодательства. \
     Отвечай кратко и по существу, с конкретными цифрами и датами. \
     Бери только свежие новости и проверяй даты в источниках."
        .to_string()
}

/// One post about yesterday's or today's change. `feedback` comes from a rejected previous reply.
pub fn single_news_request(today: NaiveDate, feedback: &str) -> NewsRequest {
    let yesterday = russian_day_month(today - Duration::days(1));
    let mut prompt = format!(
        "Найди одно главное изменение в российском законодательстве за {yesterday} или сегодня.\n\
         Новость не старше 3 дней, в тексте обязательно укажи точную дату.\n\
         Приведи конкретные суммы, проценты и сроки. Комментарий 100-120 слов, 2-3 абзаца, \
         юридический стиль с лёгкой иронией, не больше двух эмодзи.\n\n\
         Формат ответа:\n\n\
         {TITLE_GLYPH} [Название закона или изменения]\n\n\
         💬 КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА:\n\n\
         [Суть изменения с цифрами]\n\n\
         [Кого затронет и что делать]\n\n\
         ИСТОЧНИКИ:\n\
         🔗 Источник: [ссылка]\n\n\
         Если свежих новостей нет, возьми закон, который вступает в силу в ближайшие 2-4 недели, \
         и напиши \"Вступает в силу [дата]\"."
    );
    if !feedback.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(feedback);
    }
    NewsRequest {
        system: system_prompt(),
        prompt,
        max_tokens: SINGLE_MAX_TOKENS,
    }
}

/// Up to seven ranked items for the whole day, delimited by `ПРИОРИТЕТ n - ...:` headers.
pub fn daily_collection_request(today: NaiveDate) -> NewsRequest {
    let yesterday = russian_day_month(today - Duration::days(1));
    let prompt = format!(
        "Собери значимые изменения в российском законодательстве за {yesterday}.\n\
         Найди ровно 7 новостей и ранжируй их по важности:\n\
         1 - КРИТИЧЕСКИ ВАЖНО, 2 - ОЧЕНЬ ВАЖНО, 3 - ВАЖНО, 4 - СРЕДНЯЯ, \
         5 - УМЕРЕННАЯ, 6 - ДОПОЛНИТЕЛЬНАЯ, 7 - НИЗКАЯ.\n\
         Для каждой новости: конкретные цифры, кого затрагивает, дата вступления в силу, \
         2-3 надёжных источника, 100-150 слов.\n\n\
         Формат каждой новости:\n\n\
         ПРИОРИТЕТ 1 - КРИТИЧЕСКИ ВАЖНО:\n\
         {TITLE_GLYPH} [Название]\n\n\
         💬 КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА:\n\n\
         [Текст]\n\n\
         ИСТОЧНИКИ:\n\
         🔗 Источник 1: [ссылка]\n\
         🔗 Источник 2: [ссылка]\n\n\
         ---\n\n\
         Если за этот день мало изменений, добавь законы, которые вступают в силу в ближайшие 2-4 недели."
    );
    NewsRequest {
        system: system_prompt(),
        prompt,
        max_tokens: COLLECTION_MAX_TOKENS,
    }
}

/// Short text context for the image: first lines with the title glyph or a legal keyword.
pub fn comic_context(news: &str) -> String {
    let mut points = Vec::with_capacity(COMIC_CONTEXT_LINES);
    for line in news.lines() {
        if points.len() == COMIC_CONTEXT_LINES {
            break;
        }
        if line.contains(TITLE_GLYPH) {
            points.push(format!(
                "Legal document: {}",
                line.replace(TITLE_GLYPH, "").trim()
            ));
        } else {
            let lower = line.to_lowercase();
            if COMIC_KEYWORDS.iter().any(|k| lower.contains(k)) {
                points.push(line.trim().to_string());
            }
        }
    }
    points.join(" ")
}

/// Style chosen from the context digest so the same news always gets the same look.
pub fn comic_style(context: &str) -> &'static str {
    let digest = Sha256::digest(context.as_bytes());
    COMIC_STYLES[digest[0] as usize % COMIC_STYLES.len()]
}

pub fn comic_prompt(context: &str) -> String {
    let style = comic_style(context);
    format!(
        "Create a 4-panel comic strip about Russian legal news.\n\n\
         TOPIC: {context}\n\n\
         STYLE: {style}\n\n\
         Panel 1: a person discovers the legal change.\n\
         Panel 2: surprise while reading the details.\n\
         Panel 3: the person realizes what it means for them.\n\
         Panel 4: the person adapts to the new rule.\n\n\
         No text or speech bubbles. Everyday modern Russian characters in contemporary settings, \
         expressive faces, four equal panels with clear separation."
    )
}
