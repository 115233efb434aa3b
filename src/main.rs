mod assessment;
mod config;
mod oracle;
mod parser;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use assessment::{AssessmentReport, Assessor};
use config::AppConfig;
use oracle::OracleClient;
use parser::ExtractionPipeline;
use storage::AssessmentCache;
use utils::logger;

#[derive(Parser)]
#[command(name = "paperbot")]
#[command(about = "学术论文结构化信息提取与完备性评估系统", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化配置
    Init,
    /// 解析论文PDF并输出结构化结果
    Parse {
        /// PDF文件路径
        pdf: String,
        /// 结果输出文件（缺省打印到标准输出）
        #[arg(short, long)]
        output: Option<String>,
    },
    /// 只输出章节切分结果
    Sections {
        /// PDF文件路径
        pdf: String,
    },
    /// 解析并评估论文完备性（可一次评估多个文件，重复文件复用缓存）
    Assess {
        /// PDF文件路径
        #[arg(required = true)]
        pdfs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init_logger();
    info!("paperbot 启动");

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_command().await?;
        }
        Commands::Parse { pdf, output } => {
            parse_command(&pdf, output).await?;
        }
        Commands::Sections { pdf } => {
            sections_command(&pdf).await?;
        }
        Commands::Assess { pdfs } => {
            assess_command(&pdfs).await?;
        }
    }

    Ok(())
}

async fn init_command() -> Result<()> {
    info!("初始化系统...");

    tokio::fs::create_dir_all("config").await?;
    tokio::fs::create_dir_all("data/uploads").await?;

    let app_config = AppConfig::default();
    app_config.save("config/settings.toml")?;
    info!("已生成配置文件: config/settings.toml");

    info!("✅ 系统初始化完成！");
    info!("下一步:");
    info!("  1. 编辑 config/settings.toml 配置API密钥");
    info!("  2. 运行 'paperbot parse <pdf>' 解析论文");
    info!("  3. 运行 'paperbot assess <pdf>' 评估论文完备性");

    Ok(())
}

fn build_pipeline(app_config: &AppConfig) -> ExtractionPipeline {
    let oracle = OracleClient::new(app_config.oracle.clone());
    if !oracle.is_configured() {
        info!("⚠️ API key 未配置，标题提取与图表解释将跳过Oracle阶段");
    }
    ExtractionPipeline::new(app_config.parser.clone()).with_oracle(oracle)
}

async fn parse_command(pdf: &str, output: Option<String>) -> Result<()> {
    info!("开始解析: {}", pdf);

    let app_config = AppConfig::load()?;
    let pipeline = build_pipeline(&app_config);

    let paper = pipeline.process(pdf).await?;
    info!(
        "解析完成: {} ({} 页, {} 处引用, {} 个图表)",
        paper.metadata.title,
        paper.metadata.total_pages,
        paper.metadata.total_citations,
        paper.metadata.total_figures + paper.metadata.total_tables
    );

    let json = serde_json::to_string_pretty(&paper)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            info!("结果已写入: {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}

async fn sections_command(pdf: &str) -> Result<()> {
    let app_config = AppConfig::load()?;
    let pipeline = build_pipeline(&app_config);

    let paper = pipeline.process(pdf).await?;
    println!("{}", serde_json::to_string_pretty(&paper.sections)?);

    Ok(())
}

async fn assess_command(pdfs: &[String]) -> Result<()> {
    let app_config = AppConfig::load()?;
    let cache: AssessmentCache<AssessmentReport> =
        AssessmentCache::new(app_config.storage.assessment_cache_capacity);

    let pipeline = build_pipeline(&app_config);
    let oracle = OracleClient::new(app_config.oracle.clone());
    if !oracle.is_configured() {
        warn!("API key 未配置，评估将大量使用确定性回退");
    }
    let assessor = Assessor::new(oracle);

    for pdf in pdfs {
        info!("开始评估: {}", pdf);

        // 以文件内容哈希为键复用最近的评估结果
        let file_hash = storage::content_hash(pdf)?;
        if let Some(report) = cache.get(&file_hash) {
            info!("命中评估缓存: {}...", &file_hash[..8]);
            print_report(&report)?;
            continue;
        }

        let mut paper = pipeline.process(pdf).await?;
        assessor.explain_figures_tables(&mut paper.figures_tables).await;

        let report = assessor.assess(&paper).await?;
        cache.set(file_hash, report.clone());

        info!(
            "评估完成: {} ({:.1}分, 领域: {})",
            report.assessment.paper_title,
            report.assessment.overall_completeness_score,
            report.assessment.research_field
        );
        print_report(&report)?;
    }

    Ok(())
}

fn print_report(report: &AssessmentReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
