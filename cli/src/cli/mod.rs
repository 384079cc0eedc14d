use clap::{Parser, Subcommand};
use dg_utxo_core::blockchain::address::Network;
use dg_utxo_core::blockchain::payment::{OwnerType, Payment};
use dg_utxo_core::blockchain::sized_bytes::Bytes32;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, value_name = "Path to a ledger config yaml")]
    pub config: Option<String>,

    #[arg(long, value_name = "Postgres connection url")]
    pub database_url: Option<String>,
    #[arg(long, value_name = "Node JSON-RPC url")]
    pub node_url: Option<String>,
    #[arg(long, value_name = "MAPI base url")]
    pub mapi_url: Option<String>,
    #[arg(long, value_name = "main, test or stn")]
    pub network: Option<Network>,

    #[command(subcommand)]
    pub action: RootCommands,
}

#[derive(Debug, Subcommand)]
pub enum RootCommands {
    #[command(about = "Creates the ledger tables", long_about = None)]
    Migrate,
    #[command(about = "Submits a raw transaction and records its effects", long_about = None)]
    Broadcast {
        #[arg(short, long)]
        rawtx: String,
    },
    #[command(about = "Funds a raw transaction from tracked coins", long_about = None)]
    Fund {
        #[arg(short, long)]
        rawtx: String,
        #[arg(long, value_parser = parse_payment, value_name = "FROM:AMOUNT")]
        payment: Vec<Payment>,
        #[arg(long)]
        payer: Option<String>,
        #[arg(short, long, default_value_t = 0)]
        split: u64,
        #[arg(short, long)]
        fee_rate: Option<f64>,
    },
    #[command(about = "Prints the previous outputs of every input", long_about = None)]
    Parents {
        #[arg(short, long)]
        rawtx: String,
    },
    #[command(about = "Prints a raw transaction by txid", long_about = None)]
    Fetch {
        #[arg(short, long)]
        txid: Bytes32,
    },
    #[command(about = "Lists unspent fund coins of an owner", long_about = None)]
    Utxos {
        #[arg(short, long)]
        owner: String,
        #[arg(short = 't', long, default_value_t = OwnerType::Script)]
        owner_type: OwnerType,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    #[command(about = "Counts unspent fund coins of an owner", long_about = None)]
    UtxoCount {
        #[arg(short, long)]
        owner: String,
        #[arg(short = 't', long, default_value_t = OwnerType::Script)]
        owner_type: OwnerType,
    },
    #[command(about = "Sums unspent fund coins of an owner", long_about = None)]
    Balance {
        #[arg(short, long)]
        owner: String,
        #[arg(short = 't', long, default_value_t = OwnerType::Script)]
        owner_type: OwnerType,
    },
    #[command(about = "Prints the transaction that spent an asset output", long_about = None)]
    Spends {
        #[arg(short, long)]
        txid: Bytes32,
        #[arg(short, long)]
        vout: u32,
    },
    #[command(about = "Retries commits that failed after node acceptance", long_about = None)]
    Reconcile {
        #[arg(short, long)]
        watch: bool,
    },
}

pub fn parse_payment(s: &str) -> Result<Payment, String> {
    let (from, amount) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("Expected FROM:AMOUNT, got {s}"))?;
    let amount = amount
        .parse()
        .map_err(|e| format!("Invalid amount in {s}: {e}"))?;
    Ok(Payment {
        from: from.to_string(),
        amount,
    })
}

#[test]
fn test_parse_payment() {
    let payment = parse_payment("1BoatSLRHtKNngkdXEeobR76b53LETtpyT:1500").expect("valid payment");
    assert_eq!(payment.from, "1BoatSLRHtKNngkdXEeobR76b53LETtpyT");
    assert_eq!(payment.amount, 1500);
    assert!(parse_payment("no-amount").is_err());
}
