use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = sem_api::Args::parse();

	sem_api::run(args).await
}
