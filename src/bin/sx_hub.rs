use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sx_hub::{
  Connector, HubConfig, Network, NetworkFamily, NetworkId, PickParams, RelayerType, ServeArgs, StrategyPicker,
};

#[derive(Parser)]
#[command(name = "sx_hub", version, about)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the read API.
  Serve(ServeArgs),
  /// Print the authenticator and strategies a wallet would use on a space.
  Pick(PickArgs),
}

#[derive(Args)]
struct PickArgs {
  #[clap(long)]
  network: String,
  #[clap(long)]
  space: String,
  #[clap(long, value_enum, default_value = "injected")]
  connector: Connector,
  /// The wallet is a smart contract account.
  #[clap(long)]
  contract: bool,
  #[command(flatten)]
  config: HubConfig,
}

impl PickArgs {
  async fn run(&self) -> Result<()> {
    let hub = self.config.to_hub().await?;
    let network_id = NetworkId::new(self.network.as_str());
    let network = hub.registry.get(&network_id)?;
    let space = hub.space(&network_id, &self.space).await?;

    let low_priority: &[RelayerType] =
      if network.family() == NetworkFamily::Starknet { &[RelayerType::EvmTx] } else { &[] };
    let picker = StrategyPicker::new(network.descriptor(), network.manager_connectors(), low_priority);
    let pick = picker.pick(&PickParams::for_space(&space, self.contract, self.connector))?;

    println!("{}", serde_json::to_string_pretty(&pick)?);
    Ok(())
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  match Cli::parse().command {
    Command::Serve(args) => args.serve().await,
    Command::Pick(args) => args.run().await,
  }
}
