use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tts_broker::RedisBroker;
use tts_credentials::CredentialStore;

/// Thin CLI wrapper around the credential store, per spec.md 7's
/// "key-management CLI, a thin wrapper around the credential store".
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	#[arg(long, env = "BROKER_URL", default_value = "redis://127.0.0.1:6379")]
	broker_url: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create a new API key and print its one-time secret
	Create {
		/// Human-readable label for the key
		name: String,
	},
	/// List every known API key and its usage counters
	List,
	/// Permanently delete a key by its public id
	Delete {
		/// The 8-character `key_id`, not the full secret
		key_id: String,
	},
	/// Show a single key's info by its public id
	Info {
		key_id: String,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenv::dotenv().ok();
	let args = Args::parse();

	let broker = Arc::new(RedisBroker::connect(&args.broker_url).await.context("failed to connect to broker")?);
	let credentials = CredentialStore::new(broker);

	match args.command {
		Command::Create { name } => {
			let (secret, info) = credentials.create(&name).await?;
			println!("key_id:  {}", info.key_id);
			println!("name:    {}", info.name);
			println!("secret:  {secret}");
			println!("(the secret above is shown once and is not recoverable)");
		}
		Command::List => {
			let credentials = credentials.list().await?;
			if credentials.is_empty() {
				println!("no keys found");
			}
			for info in credentials {
				println!("{}\t{}\trequests={}\taudio_seconds={:.1}\tcreated_at={}", info.key_id, info.name, info.requests_count, info.audio_seconds, info.created_at);
			}
		}
		Command::Delete { key_id } => {
			if credentials.delete(&key_id).await? {
				println!("deleted {key_id}");
			} else {
				println!("no such key: {key_id}");
			}
		}
		Command::Info { key_id } => {
			let found = credentials.list().await?.into_iter().find(|info| info.key_id == key_id);
			match found {
				Some(info) => {
					println!("key_id:        {}", info.key_id);
					println!("name:          {}", info.name);
					println!("created_at:    {}", info.created_at);
					println!("requests:      {}", info.requests_count);
					println!("audio_seconds: {:.1}", info.audio_seconds);
				}
				None => println!("no such key: {key_id}"),
			}
		}
	}

	Ok(())
}
