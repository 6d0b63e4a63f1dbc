use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = handraise_api::Args::parse();

	handraise_api::run(args).await
}
