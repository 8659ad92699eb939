use anyhow::{Context, Result};
use exam_session::utils::logging;
use exam_session::{App, Config, ExamId};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let exam_id = std::env::args()
        .nth(1)
        .map(ExamId::new)
        .context("用法: exam_session <考试编号>")?;

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    app.run(exam_id).await?;

    Ok(())
}
