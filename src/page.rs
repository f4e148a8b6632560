//! Static HTML gallery page.
//!
//! Uses [maud](https://maud.lambda.xyz/) so every interpolated name and URL is escaped.
//! The UI text is Russian and the styling is inline and fixed.

use std::path::Path;

use chrono::{DateTime, Local};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use tokio::fs::create_dir_all;

use crate::manifest::PhotoRecord;

const TITLE: &str = "Фото с Яндекс.Диска";
const EMPTY_PLACEHOLDER: &str = "Нет фотографий";

const CSS: &str = r#"
body {
    font-family: Arial, sans-serif;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
    background: #f9f9f9;
}
.header {
    text-align: center;
    margin-bottom: 30px;
    padding: 20px;
    background: white;
    border-radius: 10px;
    box-shadow: 0 2px 10px rgba(0,0,0,0.1);
}
.gallery {
    display: flex;
    flex-direction: column;
    gap: 20px;
}
.photo-container {
    background: white;
    padding: 20px;
    border-radius: 10px;
    box-shadow: 0 2px 10px rgba(0,0,0,0.1);
}
.empty {
    text-align: center;
}
.info {
    margin-top: 30px;
    padding: 20px;
    background: #eef4ff;
    border-radius: 10px;
}
img {
    max-width: 100%;
    height: auto;
    display: block;
    margin: 0 auto;
    border-radius: 4px;
}
"#;

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn photo_block(record: &PhotoRecord, asset_prefix: &str) -> Markup {
    html! {
        div.photo-container {
            h3 { (record.name) }
            @if let Some(src) = record.image_src(asset_prefix) {
                img src=(&*src) alt=(record.name) loading="lazy";
            }
            p { "Размер: " (group_thousands(record.size)) " байт" }
        }
    }
}

fn info_block() -> Markup {
    html! {
        div.info {
            p { strong { "Как это работает:" } }
            ol {
                li { "Программа получает список файлов из папок Яндекс.Диска" }
                li { "Из списка отбираются только изображения" }
                li { "Фото скачиваются рядом со страницей или публикуются по ссылке" }
                li { "Список фото и эта страница перезаписываются при каждом запуске" }
            }
        }
    }
}

/// Render the whole page for `records`, stamped with `generated`.
///
/// Local image paths are prefixed with `asset_prefix`, see [`crate::config::Output::asset_prefix`].
pub fn render(records: &[PhotoRecord], generated: DateTime<Local>, asset_prefix: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="ru" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (TITLE) }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.header {
                    h1 { "🖼️ Фотогалерея" }
                    p { "Фото загружены с Яндекс.Диска" }
                    p { "Обновлено: " (generated.format("%d.%m.%Y %H:%M").to_string()) }
                    p { "Всего фото: " (records.len()) }
                }
                div.gallery {
                    @if records.is_empty() {
                        p.empty { (EMPTY_PLACEHOLDER) }
                    } @else {
                        @for record in records {
                            (photo_block(record, asset_prefix))
                        }
                    }
                }
                (info_block())
            }
        }
    }
}

/// Write the rendered page to `path`, creating parent directories.
pub async fn write_page(path: impl AsRef<Path>, page: Markup) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(parent).await?;
    }
    tokio::fs::write(path, page.into_string()).await
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::api::data::field::Resource;

    fn generated() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_render_empty_placeholder() {
        let html = render(&[], generated(), "").into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<html lang="ru">"#));
        assert!(html.contains(EMPTY_PLACEHOLDER));
        assert!(html.contains("Обновлено: 09.03.2024 07:05"));
        assert!(html.contains("Всего фото: 0"));
        assert!(!html.contains("photo-container\""));
        assert!(html.contains("Как это работает:"));
    }

    #[test]
    fn test_render_prefixes_local_paths_only() {
        let local = PhotoRecord::from(&Resource::file("a.jpg", "disk:/a.jpg"))
            .with_local_path("photo_0.jpg", 1);
        let remote = PhotoRecord::from(&Resource::file("b.png", "disk:/b.png"))
            .with_urls("https://downloader.disk.yandex.ru/disk/KEY", None);

        let html = render(&[local, remote], generated(), "../").into_string();
        assert!(html.contains(r#"src="../photo_0.jpg""#));
        assert!(html.contains(r#"src="https://downloader.disk.yandex.ru/disk/KEY""#));
    }

    #[test]
    fn test_render_records() {
        let local = PhotoRecord::from(&Resource::file("кот.jpg", "disk:/кот.jpg"))
            .with_local_path("photo_0.jpg", 123456);
        let remote = PhotoRecord::from(&Resource::file("b.png", "disk:/b.png"))
            .with_urls("https://downloader.disk.yandex.ru/disk/KEY", None);
        let unresolved = PhotoRecord::from(&Resource::file("c.gif", "disk:/c.gif"));

        let html = render(&[local, remote, unresolved], generated(), "").into_string();
        assert!(!html.contains(EMPTY_PLACEHOLDER));
        assert!(html.contains("<h3>кот.jpg</h3>"));
        assert!(html.contains(r#"src="photo_0.jpg""#));
        assert!(html.contains("Размер: 123,456 байт"));
        assert!(html.contains(r#"src="https://downloader.disk.yandex.ru/disk/KEY""#));
        assert!(html.contains("<h3>c.gif</h3>"));
        assert_eq!(html.matches("<img").count(), 2);
        assert!(html.contains("Всего фото: 3"));
    }

    #[test]
    fn test_render_escapes_names() {
        let record = PhotoRecord::from(&Resource::file(
            "<script>alert('x')</script>.jpg",
            "disk:/x.jpg",
        ))
        .with_local_path("photo_0.jpg", 1);
        let html = render(&[record], generated(), "").into_string();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_write_page() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("site/index.html");
        write_page(&path, render(&[], generated(), "")).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(EMPTY_PLACEHOLDER));
        temp_dir.close().unwrap();
    }
}
