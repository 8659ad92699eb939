use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 连接到浏览器并找到考试页面
///
/// 优先复用标题包含 `target_title` 的已打开标签页，找不到时打开 `fallback_url`（若给出）。
pub async fn attach_to_exam_page(
    port: u16,
    target_title: &str,
    fallback_url: Option<&str>,
) -> Result<(Browser, Page), BrowserError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标标题: {}, 备用 URL: {:?}", target_title, fallback_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::connection_failed(port, e)
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    for p in pages.iter() {
        if let Ok(Some(page_title)) = p.get_title().await {
            debug!("检查页面标题: {}", page_title);
            if page_title.contains(target_title) {
                info!("✓ 找到考试页面: {}", page_title);
                return Ok((browser, p.clone()));
            }
        }
    }

    let url = fallback_url.unwrap_or("about:blank");
    debug!("未找到考试页面，创建新页面: {}", url);
    let page = browser.new_page(url).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        BrowserError::PageCreationFailed {
            source: Box::new(e),
        }
    })?;
    info!("已打开: {}", url);

    Ok((browser, page))
}
