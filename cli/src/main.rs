use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use spl_token_2022::state::AccountState;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use token_gate_sdk::lists::{get_all_lists, get_list};
use token_gate_sdk::{
    get_mint_details, resolve_mint_config, resolve_token_account, simulate_transaction,
    submit_transaction, AccessAction, AccessRequest, Authority, CreateMintParams, GateError,
    GateTransaction, List, ListMode, MetadataExtension, MintExtensions, MintToParams, ProgramIds,
    RpcAccountSource, RpcSettings, TransactionBuilder, TransactionVersion,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "token-gate", version, about = "Token access-gate CLI")]
struct Cli {
    #[arg(long)]
    cluster: Option<String>,

    #[arg(long)]
    keypair: Option<String>,

    /// TOML file with [network], [programs] and [mint] sections
    #[arg(long)]
    config: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Print the unsigned transaction instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Simulate the transaction and print program logs instead of sending it
    #[arg(long, conflicts_with = "dry_run")]
    simulate: bool,

    #[arg(long, default_value = "legacy")]
    tx_version: TransactionVersion,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    CreateList(CreateListArgs),
    AddWallet(ListWalletArgs),
    RemoveWallet(ListWalletArgs),
    SetListMode(SetListModeArgs),
    DeleteList(ListArgs),
    SetupExtraMetas(SetupExtraMetasArgs),
    List(ListArgs),
    Lists,
    Allow(AddressArgs),
    Disallow(AddressArgs),
    Block(AddressArgs),
    Unblock(AddressArgs),
    CreateConfig(CreateConfigArgs),
    SetGatingProgram(SetGatingProgramArgs),
    EnableThaw(MintOnlyArgs),
    Freeze(AddressArgs),
    Thaw(AddressArgs),
    CreateMint(CreateMintArgs),
    Mint(MintArgs),
    MintDetails(MintOnlyArgs),
    Account(AddressArgs),
}

#[derive(Parser)]
struct CreateListArgs {
    #[arg(long, default_value = "allow")]
    mode: ListMode,

    #[arg(long)]
    mint: Option<String>,
}

#[derive(Parser)]
struct ListWalletArgs {
    wallet: String,

    #[arg(long)]
    list: String,
}

#[derive(Parser)]
struct SetListModeArgs {
    mode: ListMode,

    #[arg(long)]
    list: String,
}

#[derive(Parser)]
struct ListArgs {
    list: String,
}

#[derive(Parser)]
struct SetupExtraMetasArgs {
    /// List addresses consulted by permissionless freeze/thaw
    #[arg(long = "list", required = true)]
    lists: Vec<String>,

    #[arg(long)]
    no_freeze: bool,

    #[arg(long)]
    no_thaw: bool,

    #[arg(long)]
    mint: Option<String>,
}

#[derive(Parser)]
struct AddressArgs {
    /// Wallet or token account
    address: String,

    #[arg(long)]
    mint: Option<String>,
}

#[derive(Parser)]
struct MintOnlyArgs {
    #[arg(long)]
    mint: Option<String>,
}

#[derive(Parser)]
struct CreateConfigArgs {
    /// Defaults to the access-list program
    #[arg(long)]
    gating_program: Option<String>,

    #[arg(long)]
    mint: Option<String>,
}

#[derive(Parser)]
struct SetGatingProgramArgs {
    gating_program: String,

    #[arg(long)]
    mint: Option<String>,
}

#[derive(Parser)]
struct CreateMintArgs {
    #[arg(long)]
    decimals: Option<u8>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    uri: Option<String>,

    /// Defaults to the payer
    #[arg(long)]
    freeze_authority: Option<String>,

    #[arg(long)]
    default_frozen: bool,

    #[arg(long)]
    pausable: bool,

    #[arg(long)]
    permanent_delegate: Option<String>,

    #[arg(long)]
    confidential: bool,

    #[arg(long)]
    ui_multiplier: Option<f64>,
}

#[derive(Parser)]
struct MintArgs {
    recipient: String,
    amount: String,

    #[arg(long)]
    mint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(err) = &result {
        if let Some(gate_err) = err.downcast_ref::<GateError>() {
            for line in gate_err.logs() {
                eprintln!("  {}", line);
            }
        }
    }
    result
}

fn init_tracing() {
    // stdout carries command output, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let solana_config = load_solana_cli_config().ok();
    let config_file = cli
        .config
        .as_deref()
        .map(load_gate_config)
        .transpose()?
        .unwrap_or_default();
    let ctx = build_context(&cli, solana_config.as_ref(), &config_file)?;

    match &cli.command {
        Commands::CreateList(args) => handle_create_list(&ctx, args).await,
        Commands::AddWallet(args) => handle_add_wallet(&ctx, args).await,
        Commands::RemoveWallet(args) => handle_remove_wallet(&ctx, args).await,
        Commands::SetListMode(args) => handle_set_list_mode(&ctx, args).await,
        Commands::DeleteList(args) => handle_delete_list(&ctx, args).await,
        Commands::SetupExtraMetas(args) => handle_setup_extra_metas(&ctx, args).await,
        Commands::List(args) => handle_list(&ctx, args).await,
        Commands::Lists => handle_lists(&ctx).await,
        Commands::Allow(args) => {
            handle_access(&ctx, args, ListMode::Allow, AccessAction::Grant).await
        }
        Commands::Disallow(args) => {
            handle_access(&ctx, args, ListMode::Allow, AccessAction::Revoke).await
        }
        Commands::Block(args) => {
            handle_access(&ctx, args, ListMode::Block, AccessAction::Revoke).await
        }
        Commands::Unblock(args) => {
            handle_access(&ctx, args, ListMode::Block, AccessAction::Grant).await
        }
        Commands::CreateConfig(args) => handle_create_config(&ctx, args).await,
        Commands::SetGatingProgram(args) => handle_set_gating_program(&ctx, args).await,
        Commands::EnableThaw(args) => handle_enable_thaw(&ctx, args).await,
        Commands::Freeze(args) => handle_freeze(&ctx, args, true).await,
        Commands::Thaw(args) => handle_freeze(&ctx, args, false).await,
        Commands::CreateMint(args) => handle_create_mint(&ctx, args, &config_file).await,
        Commands::Mint(args) => handle_mint(&ctx, args).await,
        Commands::MintDetails(args) => handle_mint_details(&ctx, args).await,
        Commands::Account(args) => handle_account(&ctx, args).await,
    }
}

#[derive(Debug, Clone)]
struct ClusterInfo {
    url: String,
    label: Option<String>,
}

struct AppContext {
    source: RpcAccountSource,
    payer: Authority,
    ids: ProgramIds,
    output: OutputFormat,
    cluster: ClusterInfo,
    mode: SendMode,
    version: TransactionVersion,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SendMode {
    Send,
    DryRun,
    Simulate,
}

impl AppContext {
    fn payer_pubkey(&self) -> Pubkey {
        self.payer.address()
    }

    fn builder(&self) -> TransactionBuilder<'_> {
        TransactionBuilder::new(&self.source, self.ids, self.payer_pubkey())
            .with_version(self.version)
    }
}

fn build_context(
    cli: &Cli,
    solana_config: Option<&SolanaCliConfig>,
    config_file: &GateConfig,
) -> Result<AppContext> {
    let network_override = config_file.network.as_ref();
    let cluster_value = if let Some(value) = cli.cluster.as_deref() {
        value.to_string()
    } else if let Some(value) = network_override.and_then(|cfg| cfg.cluster.as_deref()) {
        value.to_string()
    } else if let Some(config) = solana_config {
        config.json_rpc_url.clone()
    } else {
        "devnet".to_string()
    };

    let cluster = resolve_cluster(&cluster_value)?;

    let keypair_value = if let Some(value) = cli.keypair.as_deref() {
        value.to_string()
    } else if let Some(value) = network_override.and_then(|cfg| cfg.keypair_path.as_deref()) {
        value.to_string()
    } else if let Some(config) = solana_config {
        config.keypair_path.clone()
    } else {
        return Err(anyhow!(
            "Missing keypair path. Use --keypair or Solana CLI config."
        ));
    };

    let commitment_value =
        if let Some(value) = network_override.and_then(|cfg| cfg.commitment.as_deref()) {
            Some(value.to_string())
        } else {
            solana_config.and_then(|cfg| cfg.commitment.clone())
        };

    let commitment = parse_commitment(commitment_value.as_deref());

    let keypair_path = expand_tilde(&keypair_value);
    let payer = read_keypair_file(&keypair_path)
        .map_err(|err| anyhow!("Failed to read keypair: {}", err))?;

    let ids = program_ids(config_file.programs.as_ref())?;
    debug!(url = %cluster.url, ?ids, "resolved context");
    let source = RpcAccountSource::new(&RpcSettings::new(cluster.url.clone(), commitment));

    let mode = if cli.dry_run {
        SendMode::DryRun
    } else if cli.simulate {
        SendMode::Simulate
    } else {
        SendMode::Send
    };

    Ok(AppContext {
        source,
        payer: Authority::capable(payer),
        ids,
        output: cli.output,
        cluster,
        mode,
        version: cli.tx_version,
    })
}

fn program_ids(config: Option<&ProgramsConfig>) -> Result<ProgramIds> {
    let mut ids = ProgramIds::default();
    if let Some(config) = config {
        if let Some(value) = config.token_acl.as_deref() {
            ids = ids.with_token_acl_program(parse_pubkey(value)?);
        }
        if let Some(value) = config.access_list.as_deref() {
            ids = ids.with_access_list_program(parse_pubkey(value)?);
        }
    }
    Ok(ids)
}

async fn handle_create_list(ctx: &AppContext, args: &CreateListArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let (transaction, list) = ctx
        .builder()
        .create_list(&ctx.payer_pubkey(), &mint, args.mode)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    if ctx.output == OutputFormat::Json {
        print_json(&ListOutput {
            list: list.to_string(),
            mode: args.mode.to_string(),
            tx,
        })
    } else {
        println!("List created");
        println!("List: {}", list);
        println!("Mode: {}", args.mode);
        print_tx(&tx);
        Ok(())
    }
}

async fn handle_add_wallet(ctx: &AppContext, args: &ListWalletArgs) -> Result<()> {
    let list = parse_pubkey(&args.list)?;
    let wallet = parse_pubkey(&args.wallet)?;
    let transaction = ctx
        .builder()
        .add_wallet(&ctx.payer_pubkey(), &list, &wallet)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("Added {} to list {}", wallet, list), tx)
}

async fn handle_remove_wallet(ctx: &AppContext, args: &ListWalletArgs) -> Result<()> {
    let list = parse_pubkey(&args.list)?;
    let wallet = parse_pubkey(&args.wallet)?;
    let transaction = ctx
        .builder()
        .remove_wallet(&ctx.payer_pubkey(), &list, &wallet)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("Removed {} from list {}", wallet, list), tx)
}

async fn handle_set_list_mode(ctx: &AppContext, args: &SetListModeArgs) -> Result<()> {
    let list = parse_pubkey(&args.list)?;
    let transaction = ctx
        .builder()
        .set_list_mode(&ctx.payer_pubkey(), &list, args.mode)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("List {} set to {} mode", list, args.mode), tx)
}

async fn handle_delete_list(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let list = parse_pubkey(&args.list)?;
    let transaction = ctx
        .builder()
        .delete_list(&ctx.payer_pubkey(), &list)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("Deleted list {}", list), tx)
}

async fn handle_setup_extra_metas(ctx: &AppContext, args: &SetupExtraMetasArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let lists = args
        .lists
        .iter()
        .map(|value| parse_pubkey(value))
        .collect::<Result<Vec<_>>>()?;
    let transaction = ctx
        .builder()
        .setup_extra_metas(&ctx.payer_pubkey(), &mint, &lists, !args.no_freeze, !args.no_thaw)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(
        ctx,
        &format!("Bound {} list(s) to mint {}", lists.len(), mint),
        tx,
    )
}

async fn handle_list(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let list = parse_pubkey(&args.list)?;
    let list = get_list(&ctx.source, &ctx.ids, &list).await?;
    if ctx.output == OutputFormat::Json {
        print_json(&ListInfo::from(&list))
    } else {
        print_list(&list);
        Ok(())
    }
}

async fn handle_lists(ctx: &AppContext) -> Result<()> {
    let lists = get_all_lists(&ctx.source, &ctx.ids).await?;
    if ctx.output == OutputFormat::Json {
        print_json(&ListsOutput {
            lists: lists.iter().map(ListInfo::from).collect(),
        })
    } else {
        if lists.is_empty() {
            println!("No lists found");
        }
        for list in &lists {
            print_list(list);
            println!();
        }
        Ok(())
    }
}

fn print_list(list: &List) {
    println!("List:      {}", list.config.address);
    println!("Mode:      {}", list.config.mode);
    println!("Mint:      {}", list.config.seed);
    println!("Authority: {}", list.config.authority);
    println!("Wallets:   {}", list.wallets.len());
    for wallet in &list.wallets {
        println!("  {}", wallet);
    }
}

async fn handle_access(
    ctx: &AppContext,
    args: &AddressArgs,
    mode: ListMode,
    action: AccessAction,
) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let account = parse_pubkey(&args.address)?;
    let request = AccessRequest {
        mint,
        account,
        authority: ctx.payer_pubkey(),
        mode,
        action,
    };
    let (transaction, plan) = ctx.builder().access(&request).await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    if ctx.output == OutputFormat::Json {
        print_json(&AccessOutput {
            path: plan.path.to_string(),
            token_account: plan.token_account.token_account.to_string(),
            wallet: plan.token_account.wallet.to_string(),
            list: plan.list.map(|list| list.to_string()),
            instructions: plan.instructions.len(),
            tx,
        })
    } else {
        println!("Path:          {}", plan.path);
        println!("Token account: {}", plan.token_account.token_account);
        println!("Wallet:        {}", plan.token_account.wallet);
        if let Some(list) = plan.list {
            println!("List:          {}", list);
        }
        println!("Instructions:  {}", plan.instructions.len());
        print_tx(&tx);
        Ok(())
    }
}

async fn handle_create_config(ctx: &AppContext, args: &CreateConfigArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let gating_program = args.gating_program.as_deref().map(parse_pubkey).transpose()?;
    let (transaction, config) = ctx
        .builder()
        .create_mint_config(&ctx.payer_pubkey(), &mint, gating_program)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("Mint config created: {}", config), tx)
}

async fn handle_set_gating_program(ctx: &AppContext, args: &SetGatingProgramArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let gating_program = parse_pubkey(&args.gating_program)?;
    let transaction = ctx
        .builder()
        .set_gating_program(&ctx.payer_pubkey(), &mint, &gating_program)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("Gating program set to {}", gating_program), tx)
}

async fn handle_enable_thaw(ctx: &AppContext, args: &MintOnlyArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let transaction = ctx
        .builder()
        .enable_permissionless_thaw(&ctx.payer_pubkey(), &mint)
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(ctx, &format!("Permissionless thaw enabled for {}", mint), tx)
}

async fn handle_freeze(ctx: &AppContext, args: &AddressArgs, freeze: bool) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let address = parse_pubkey(&args.address)?;
    let state = resolve_token_account(&ctx.source, &ctx.ids, &address, &mint).await?;
    if !state.is_initialized {
        return Err(anyhow!(
            "Token account {} does not exist yet",
            state.token_account
        ));
    }
    let builder = ctx.builder();
    let transaction = if freeze {
        builder
            .freeze(&ctx.payer_pubkey(), &mint, &state.token_account)
            .await?
    } else {
        builder
            .thaw(&ctx.payer_pubkey(), &mint, &state.token_account)
            .await?
    };
    let tx = execute(ctx, &transaction, &[]).await?;
    let verb = if freeze { "Frozen" } else { "Thawed" };
    report_simple(
        ctx,
        &format!("{} token account: {}", verb, state.token_account),
        tx,
    )
}

async fn handle_create_mint(
    ctx: &AppContext,
    args: &CreateMintArgs,
    config: &GateConfig,
) -> Result<()> {
    let mint_keypair = Keypair::new();
    let mint = mint_keypair.pubkey();
    let file = config.mint.clone().unwrap_or_default();
    let decimals = args.decimals.or(file.decimals).unwrap_or(6);
    let freeze_authority = match args
        .freeze_authority
        .as_deref()
        .or(file.freeze_authority.as_deref())
    {
        Some(value) => parse_pubkey(value)?,
        None => ctx.payer_pubkey(),
    };
    let extensions = mint_extensions(args, &file)?;
    let params = CreateMintParams {
        payer: ctx.payer_pubkey(),
        mint,
        mint_authority: ctx.payer_pubkey(),
        freeze_authority: Some(freeze_authority),
        decimals,
        extensions,
    };
    let transaction = ctx.builder().create_mint(&params).await?;
    let tx = execute(ctx, &transaction, &[Authority::capable(mint_keypair)]).await?;
    if ctx.output == OutputFormat::Json {
        print_json(&CreateMintOutput {
            mint: mint.to_string(),
            decimals,
            extensions: params
                .extensions
                .extension_types()
                .iter()
                .map(|extension| format!("{:?}", extension))
                .collect(),
            tx,
        })
    } else {
        println!("Mint created");
        println!("Mint:     {}", mint);
        println!("Decimals: {}", decimals);
        for extension in params.extensions.extension_types() {
            println!("  {:?}", extension);
        }
        print_tx(&tx);
        Ok(())
    }
}

fn mint_extensions(args: &CreateMintArgs, file: &MintFileConfig) -> Result<MintExtensions> {
    let flags = file.extensions.clone().unwrap_or_default();
    let name = args.name.clone().or_else(|| file.name.clone());
    let symbol = args.symbol.clone().or_else(|| file.symbol.clone());
    let metadata = match (name, symbol) {
        (Some(name), Some(symbol)) => Some(MetadataExtension {
            name,
            symbol,
            uri: args.uri.clone().or_else(|| file.uri.clone()).unwrap_or_default(),
            additional_metadata: Vec::new(),
        }),
        (None, None) => None,
        _ => return Err(anyhow!("--name and --symbol must be given together")),
    };
    let default_frozen = args.default_frozen || flags.default_account_frozen.unwrap_or(false);
    let permanent_delegate = args
        .permanent_delegate
        .as_deref()
        .or(flags.permanent_delegate.as_deref())
        .map(parse_pubkey)
        .transpose()?;
    Ok(MintExtensions {
        metadata,
        pausable: args.pausable || flags.pausable.unwrap_or(false),
        default_account_state: default_frozen.then_some(AccountState::Frozen),
        permanent_delegate,
        confidential_balances: args.confidential || flags.confidential_balances.unwrap_or(false),
        scaled_ui_amount: args.ui_multiplier.or(flags.scaled_ui_multiplier),
    })
}

async fn handle_mint(ctx: &AppContext, args: &MintArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let recipient = parse_pubkey(&args.recipient)?;
    let config = resolve_mint_config(&ctx.source, &ctx.ids, &mint).await?;
    let amount = parse_amount(&args.amount, config.decimals)?;
    let transaction = ctx
        .builder()
        .mint_to(&MintToParams {
            payer: ctx.payer_pubkey(),
            mint,
            mint_authority: ctx.payer_pubkey(),
            recipient,
            amount,
        })
        .await?;
    let tx = execute(ctx, &transaction, &[]).await?;
    report_simple(
        ctx,
        &format!(
            "Minted {} tokens to {}",
            format_amount(amount, config.decimals),
            recipient
        ),
        tx,
    )
}

async fn handle_mint_details(ctx: &AppContext, args: &MintOnlyArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let details = get_mint_details(&ctx.source, &ctx.ids, &mint).await?;
    let config = &details.config;
    let output = MintDetailsOutput {
        mint: mint.to_string(),
        decimals: config.decimals,
        supply: format_amount(config.supply, config.decimals),
        mint_authority: config.mint_authority.map(|key| key.to_string()),
        freeze_authority: config.freeze_authority.map(|key| key.to_string()),
        extensions: config
            .extensions
            .types
            .iter()
            .map(|extension| format!("{:?}", extension))
            .collect(),
        default_frozen: config.extensions.defaults_to_frozen(),
        enhanced_gating: config.uses_enhanced_balance_gating,
        gating_program: config.gate.map(|gate| gate.gating_program.to_string()),
        permissionless_thaw: config.gate.map(|gate| gate.enable_permissionless_thaw),
        permissionless_freeze: config.gate.map(|gate| gate.enable_permissionless_freeze),
        name: details.metadata.as_ref().map(|metadata| metadata.name.clone()),
        symbol: details.metadata.as_ref().map(|metadata| metadata.symbol.clone()),
        uri: details.metadata.as_ref().map(|metadata| metadata.uri.clone()),
    };
    if ctx.output == OutputFormat::Json {
        return print_json(&output);
    }
    println!("Mint:             {}", output.mint);
    if let (Some(name), Some(symbol)) = (&output.name, &output.symbol) {
        println!("Token:            {} ({})", name, symbol);
    }
    println!("Decimals:         {}", output.decimals);
    println!("Supply:           {}", output.supply);
    println!(
        "Mint authority:   {}",
        output.mint_authority.as_deref().unwrap_or("none")
    );
    println!(
        "Freeze authority: {}",
        output.freeze_authority.as_deref().unwrap_or("none")
    );
    println!("Default frozen:   {}", output.default_frozen);
    println!("Enhanced gating:  {}", output.enhanced_gating);
    if let Some(program) = &output.gating_program {
        println!("Gating program:   {}", program);
    }
    if !output.extensions.is_empty() {
        println!("Extensions:       {}", output.extensions.join(", "));
    }
    Ok(())
}

async fn handle_account(ctx: &AppContext, args: &AddressArgs) -> Result<()> {
    let mint = resolve_mint(&args.mint)?;
    let address = parse_pubkey(&args.address)?;
    let state = resolve_token_account(&ctx.source, &ctx.ids, &address, &mint).await?;
    if ctx.output == OutputFormat::Json {
        print_json(&AccountOutput {
            token_account: state.token_account.to_string(),
            wallet: state.wallet.to_string(),
            is_initialized: state.is_initialized,
            is_frozen: state.is_frozen,
        })
    } else {
        println!("Token account: {}", state.token_account);
        println!("Wallet:        {}", state.wallet);
        println!("Initialized:   {}", state.is_initialized);
        println!("Frozen:        {}", state.is_frozen);
        Ok(())
    }
}

/// Send, simulate or print `transaction` depending on the global flags.
async fn execute(
    ctx: &AppContext,
    transaction: &GateTransaction,
    extra_signers: &[Authority],
) -> Result<TxOutput> {
    match ctx.mode {
        SendMode::DryRun => Ok(TxOutput {
            transaction: Some(transaction.to_base64()?),
            ..TxOutput::default()
        }),
        SendMode::Simulate => {
            let simulation = simulate_transaction(&ctx.source, transaction).await?;
            Ok(TxOutput {
                logs: Some(simulation.logs),
                units_consumed: simulation.units_consumed,
                ..TxOutput::default()
            })
        }
        SendMode::Send => {
            let mut signers = vec![ctx.payer.clone()];
            signers.extend(extra_signers.iter().cloned());
            let signature = submit_transaction(&ctx.source, transaction, &signers)
                .await
                .context("Failed to send transaction")?
                .to_string();
            let explorer = explorer_url(&signature, &ctx.cluster);
            Ok(TxOutput {
                signature: Some(signature),
                explorer,
                ..TxOutput::default()
            })
        }
    }
}

fn report_simple(ctx: &AppContext, message: &str, tx: TxOutput) -> Result<()> {
    if ctx.output == OutputFormat::Json {
        print_json(&tx)
    } else {
        println!("{}", message);
        print_tx(&tx);
        Ok(())
    }
}

fn print_tx(tx: &TxOutput) {
    if let Some(encoded) = &tx.transaction {
        println!("Transaction (base64): {}", encoded);
    }
    if let Some(logs) = &tx.logs {
        println!("Simulation succeeded");
        if let Some(units) = tx.units_consumed {
            println!("Compute units: {}", units);
        }
        for line in logs {
            println!("  {}", line);
        }
    }
    if let Some(signature) = &tx.signature {
        println!("Tx: {}", signature);
    }
    if let Some(url) = &tx.explorer {
        println!("Explorer: {}", url);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GateConfig {
    network: Option<NetworkConfig>,
    programs: Option<ProgramsConfig>,
    mint: Option<MintFileConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct NetworkConfig {
    cluster: Option<String>,
    keypair_path: Option<String>,
    commitment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProgramsConfig {
    token_acl: Option<String>,
    access_list: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MintFileConfig {
    name: Option<String>,
    symbol: Option<String>,
    uri: Option<String>,
    decimals: Option<u8>,
    freeze_authority: Option<String>,
    extensions: Option<ExtensionsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExtensionsConfig {
    pausable: Option<bool>,
    default_account_frozen: Option<bool>,
    permanent_delegate: Option<String>,
    confidential_balances: Option<bool>,
    scaled_ui_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct SolanaCliConfig {
    json_rpc_url: String,
    keypair_path: String,
    commitment: Option<String>,
}

fn load_gate_config(path: &str) -> Result<GateConfig> {
    let contents = fs::read_to_string(expand_tilde(path))
        .with_context(|| format!("Failed to read config: {}", path))?;
    toml::from_str(&contents).context("Failed to parse config")
}

fn load_solana_cli_config() -> Result<SolanaCliConfig> {
    let path = default_solana_config_path();
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read Solana config: {}", path.display()))?;
    serde_yaml::from_str(&contents).context("Failed to parse Solana config")
}

fn default_solana_config_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("solana");
    path.push("cli");
    path.push("config.yml");
    path
}

fn resolve_cluster(input: &str) -> Result<ClusterInfo> {
    let lowered = input.to_lowercase();
    let (url, label) = match lowered.as_str() {
        "devnet" => (
            "https://api.devnet.solana.com".to_string(),
            Some("devnet".to_string()),
        ),
        "testnet" => (
            "https://api.testnet.solana.com".to_string(),
            Some("testnet".to_string()),
        ),
        "mainnet" | "mainnet-beta" => (
            "https://api.mainnet-beta.solana.com".to_string(),
            Some("mainnet-beta".to_string()),
        ),
        "localnet" => ("http://127.0.0.1:8899".to_string(), None),
        _ => {
            if input.starts_with("http://") || input.starts_with("https://") {
                let label = if lowered.contains("devnet") {
                    Some("devnet".to_string())
                } else if lowered.contains("testnet") {
                    Some("testnet".to_string())
                } else if lowered.contains("mainnet") {
                    Some("mainnet-beta".to_string())
                } else {
                    None
                };
                (input.to_string(), label)
            } else {
                return Err(anyhow!("Unknown cluster: {}", input));
            }
        }
    };
    Ok(ClusterInfo { url, label })
}

fn parse_commitment(value: Option<&str>) -> CommitmentConfig {
    match value.unwrap_or("confirmed") {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn parse_pubkey(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|_| anyhow!("Invalid pubkey: {}", value))
}

fn resolve_mint(mint: &Option<String>) -> Result<Pubkey> {
    let value = mint.as_deref().ok_or_else(|| anyhow!("Missing --mint"))?;
    parse_pubkey(value)
}

fn parse_amount(value: &str, decimals: u8) -> Result<u64> {
    let sanitized = value.replace('_', "");
    let (whole, fractional) = sanitized.split_once('.').unwrap_or((&sanitized, ""));
    if fractional.len() > decimals as usize {
        return Err(anyhow!("Too many decimal places"));
    }
    let whole_value: u64 = if whole.is_empty() { 0 } else { whole.parse()? };
    let mut fraction = fractional.to_string();
    while fraction.len() < decimals as usize {
        fraction.push('0');
    }
    let fractional_value: u64 = if fraction.is_empty() {
        0
    } else {
        fraction.parse()?
    };
    let scale = 10u64
        .checked_pow(decimals as u32)
        .ok_or_else(|| anyhow!("Decimal overflow"))?;
    whole_value
        .checked_mul(scale)
        .and_then(|value| value.checked_add(fractional_value))
        .ok_or_else(|| anyhow!("Amount overflow"))
}

fn format_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10u64.pow(decimals as u32);
    let whole = amount / scale;
    let frac = amount % scale;
    format!("{}.{:0width$}", whole, frac, width = decimals as usize)
}

fn explorer_url(signature: &str, cluster: &ClusterInfo) -> Option<String> {
    cluster.label.as_ref().map(|label| {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature, label
        )
    })
}

#[derive(Serialize, Default)]
struct TxOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explorer: Option<String>,
    /// Base64 transaction in dry-run mode
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    units_consumed: Option<u64>,
}

#[derive(Serialize)]
struct ListOutput {
    list: String,
    mode: String,
    #[serde(flatten)]
    tx: TxOutput,
}

#[derive(Serialize)]
struct ListInfo {
    address: String,
    mode: String,
    mint: String,
    authority: String,
    wallets: Vec<String>,
}

impl From<&List> for ListInfo {
    fn from(list: &List) -> Self {
        Self {
            address: list.config.address.to_string(),
            mode: list.config.mode.to_string(),
            mint: list.config.seed.to_string(),
            authority: list.config.authority.to_string(),
            wallets: list.wallets.iter().map(|wallet| wallet.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
struct ListsOutput {
    lists: Vec<ListInfo>,
}

#[derive(Serialize)]
struct AccessOutput {
    path: String,
    token_account: String,
    wallet: String,
    list: Option<String>,
    instructions: usize,
    #[serde(flatten)]
    tx: TxOutput,
}

#[derive(Serialize)]
struct CreateMintOutput {
    mint: String,
    decimals: u8,
    extensions: Vec<String>,
    #[serde(flatten)]
    tx: TxOutput,
}

#[derive(Serialize)]
struct MintDetailsOutput {
    mint: String,
    decimals: u8,
    supply: String,
    mint_authority: Option<String>,
    freeze_authority: Option<String>,
    extensions: Vec<String>,
    default_frozen: bool,
    enhanced_gating: bool,
    gating_program: Option<String>,
    permissionless_thaw: Option<bool>,
    permissionless_freeze: Option<bool>,
    name: Option<String>,
    symbol: Option<String>,
    uri: Option<String>,
}

#[derive(Serialize)]
struct AccountOutput {
    token_account: String,
    wallet: String,
    is_initialized: bool,
    is_frozen: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
