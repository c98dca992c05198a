// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, ArgGroup, Command, arg, command, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print as pretty JSON"))
        .arg(arg!(--jsonl "Print one JSON object per line").conflicts_with("json"))
}

fn type_arg() -> Arg {
    Arg::new("type").long("type").value_name("TYPE")
}

fn id_arg() -> Arg {
    arg!(<ID> "Record id").id("id")
}

fn tx_fields(cmd: Command, required: bool) -> Command {
    cmd.arg(arg!(--amount <AMOUNT> "Amount, greater than 0").required(required))
        .arg(arg!(--description <TEXT> "What the money was for").required(required))
        .arg(arg!(--category <ID> "Category id").required(required))
        .arg(arg!(--wallet <ID> "Wallet id").required(required))
        .arg(type_arg().help("expense or income").value_parser(["expense", "income"]))
        .arg(arg!(--date <DATE> "YYYY-MM-DD, defaults to today"))
        .arg(arg!(--notes <TEXT>))
        .arg(arg!(--tags <TAGS> "Comma separated tags"))
        .arg(arg!(--receipt <PATH> "Path of a stored receipt"))
        .arg(arg!(--currency <CCY> "Currency the amount was entered in"))
}

fn wallet_cmd() -> Command {
    Command::new("wallet")
        .about("Manage wallets and transfers")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a wallet")
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--balance <AMOUNT> "Opening balance"))
                .arg(arg!(--currency <CCY>).default_value("GHS"))
                .arg(
                    type_arg()
                        .value_parser(["cash", "bank", "crypto", "ewallet"])
                        .default_value("cash"),
                )
                .arg(Arg::new("account_number").long("account-number").value_name("NUMBER"))
                .arg(arg!(--shared "Wallet is shared with someone else")),
        )
        .subcommand(json_flags(Command::new("list").about("List wallets")))
        .subcommand(
            Command::new("edit")
                .about("Edit wallet details (never the balance)")
                .arg(id_arg())
                .arg(arg!(--name <NAME>))
                .arg(type_arg().value_parser(["cash", "bank", "crypto", "ewallet"]))
                .arg(
                    Arg::new("account_number")
                        .long("account-number")
                        .value_name("NUMBER")
                        .help("Account number; pass \"\" to clear it"),
                )
                .arg(arg!(--shared <BOOL>).value_parser(value_parser!(bool))),
        )
        .subcommand(Command::new("rm").about("Delete an unused wallet").arg(id_arg()))
        .subcommand(
            Command::new("transfer")
                .about("Move money between two wallets")
                .arg(arg!(--from <ID> "Source wallet").required(true))
                .arg(arg!(--to <ID> "Destination wallet").required(true))
                .arg(arg!(--amount <AMOUNT>).required(true))
                .arg(arg!(--date <DATE>))
                .arg(arg!(--note <TEXT>)),
        )
        .subcommand(json_flags(
            Command::new("transfers").about("Recent transfers").arg(
                arg!(--limit <N>)
                    .value_parser(value_parser!(usize))
                    .default_value("10"),
            ),
        ))
}

fn category_cmd() -> Command {
    Command::new("category")
        .about("Manage categories")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a custom category")
                .arg(arg!(--name <NAME>).required(true)),
        )
        .subcommand(json_flags(Command::new("list").about("List categories")))
        .subcommand(Command::new("rm").about("Delete a custom category").arg(id_arg()))
}

fn tx_cmd() -> Command {
    Command::new("tx")
        .about("Record and browse transactions")
        .subcommand_required(true)
        .subcommand(tx_fields(Command::new("add").about("Record a transaction"), true))
        .subcommand(tx_fields(
            Command::new("edit").about("Edit a transaction").arg(id_arg()),
            false,
        ))
        .subcommand(Command::new("rm").about("Delete a transaction").arg(id_arg()))
        .subcommand(Command::new("show").about("Show one transaction").arg(id_arg()))
        .subcommand(json_flags(
            Command::new("list")
                .about("List transactions")
                .arg(arg!(--search <TEXT> "Match description, notes or tags"))
                .arg(arg!(--category <ID>))
                .arg(arg!(--wallet <ID>))
                .arg(type_arg().value_parser(["expense", "income"]))
                .arg(arg!(--from <DATE> "On or after YYYY-MM-DD"))
                .arg(arg!(--to <DATE> "On or before YYYY-MM-DD"))
                .arg(
                    arg!(--sort <KEY>)
                        .value_parser(["date", "description", "category", "amount"])
                        .default_value("date"),
                )
                .arg(arg!(--order <DIR>).value_parser(["asc", "desc"]).default_value("desc"))
                .arg(arg!(--limit <N>).value_parser(value_parser!(usize))),
        ))
}

fn budget_cmd() -> Command {
    Command::new("budget")
        .about("Spending budgets per category")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Create a budget")
                .arg(arg!(--category <ID>).required(true))
                .arg(arg!(--amount <AMOUNT>).required(true))
                .arg(
                    arg!(--period <PERIOD>)
                        .value_parser(["weekly", "monthly", "yearly"])
                        .default_value("monthly"),
                )
                .arg(Arg::new("no_notify_75").long("no-notify-75").action(ArgAction::SetTrue))
                .arg(Arg::new("no_notify_90").long("no-notify-90").action(ArgAction::SetTrue))
                .arg(Arg::new("no_notify_100").long("no-notify-100").action(ArgAction::SetTrue)),
        )
        .subcommand(json_flags(Command::new("list").about("Active budgets and their usage")))
        .subcommand(json_flags(Command::new("alerts").about("Budgets past a notified threshold")))
        .subcommand(Command::new("rm").about("Delete a budget").arg(id_arg()))
        .subcommand(Command::new("toggle").about("Activate or deactivate a budget").arg(id_arg()))
}

fn recurring_cmd() -> Command {
    Command::new("recurring")
        .about("Recurring transaction templates")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Create a template")
                .arg(arg!(--amount <AMOUNT>).required(true))
                .arg(arg!(--description <TEXT>).required(true))
                .arg(arg!(--category <ID>).required(true))
                .arg(arg!(--wallet <ID>).required(true))
                .arg(type_arg().value_parser(["expense", "income"]))
                .arg(
                    arg!(--frequency <FREQ>)
                        .value_parser(["daily", "weekly", "monthly", "yearly"])
                        .required(true),
                )
                .arg(arg!(--start <DATE>).required(true))
                .arg(arg!(--end <DATE>))
                .arg(arg!(--notes <TEXT>)),
        )
        .subcommand(json_flags(
            Command::new("list")
                .about("List active templates")
                .arg(arg!(--all "Include paused templates")),
        ))
        .subcommand(Command::new("pause").arg(id_arg()))
        .subcommand(Command::new("resume").arg(id_arg()))
        .subcommand(Command::new("rm").arg(id_arg()))
}

fn fx_cmd() -> Command {
    Command::new("fx")
        .about("Currencies and exchange rates")
        .subcommand_required(true)
        .subcommand(
            Command::new("set-base")
                .about("Set the reporting currency")
                .arg(arg!(<CURRENCY>).id("currency")),
        )
        .subcommand(
            Command::new("rate")
                .about("Rate for 1 unit of FROM")
                .arg(arg!(--from <CCY>).required(true))
                .arg(arg!(--to <CCY> "Defaults to the base currency")),
        )
        .subcommand(
            Command::new("convert")
                .arg(arg!(--amount <AMOUNT>).required(true))
                .arg(arg!(--from <CCY>).required(true))
                .arg(arg!(--to <CCY>)),
        )
        .subcommand(json_flags(Command::new("list").about("Cached rates")))
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Totals, breakdowns and overviews")
        .subcommand_required(true)
        .subcommand(json_flags(Command::new("totals").about("All-time income and expense")))
        .subcommand(json_flags(
            Command::new("period").about("Spending by category for a period").arg(
                arg!(--period <PERIOD>).value_parser(["weekly", "monthly", "quarterly", "yearly"]),
            ),
        ))
        .subcommand(json_flags(
            Command::new("analytics").about("Category breakdown and six-month trend"),
        ))
        .subcommand(json_flags(Command::new("annual").about("Per-year overview")))
        .subcommand(json_flags(
            Command::new("monthly")
                .about("Per-month overview of one year")
                .arg(arg!(--year <YEAR>).value_parser(value_parser!(i32))),
        ))
        .subcommand(json_flags(
            Command::new("balances").about("Wallet balances in the base currency"),
        ))
        .subcommand(json_flags(Command::new("dashboard")))
}

fn summary_cmd() -> Command {
    Command::new("summary")
        .about("Historical totals for periods before the ledger")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(arg!(--year <YEAR>).value_parser(value_parser!(i32)).required(true))
                .arg(arg!(--month <MONTH> "1-12, omit for a whole year").value_parser(value_parser!(u32)))
                .arg(arg!(--income <AMOUNT>))
                .arg(arg!(--expense <AMOUNT>))
                .arg(arg!(--notes <TEXT>)),
        )
        .subcommand(json_flags(Command::new("list")))
        .subcommand(Command::new("rm").arg(id_arg()))
}

fn project_cmd() -> Command {
    let item_ref = |cmd: Command| {
        cmd.arg(arg!(--project <ID>).required(true))
            .arg(arg!(--item <ID>).required(true))
    };
    let payment_ref = move |cmd: Command| item_ref(cmd).arg(arg!(--payment <ID>).required(true));

    Command::new("project")
        .about("Itemized project budgets")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--description <TEXT>))
                .arg(arg!(--wallet <ID> "Fund from a wallet"))
                .arg(arg!(--source <NAME> "Fund from an external source"))
                .group(
                    ArgGroup::new("funding")
                        .args(["wallet", "source"])
                        .required(true),
                ),
        )
        .subcommand(json_flags(Command::new("list")))
        .subcommand(json_flags(Command::new("show").arg(id_arg())))
        .subcommand(Command::new("toggle").about("Flip the completed flag").arg(id_arg()))
        .subcommand(Command::new("rm").about("Delete a project with its items").arg(id_arg()))
        .subcommand(
            Command::new("item")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--project <ID>).required(true))
                        .arg(arg!(--name <NAME>).required(true))
                        .arg(arg!(--description <TEXT>))
                        .arg(arg!(--cost <AMOUNT>))
                        .arg(type_arg().value_parser(["expense", "income"])),
                )
                .subcommand(
                    item_ref(Command::new("edit"))
                        .arg(arg!(--name <NAME>))
                        .arg(arg!(--description <TEXT>))
                        .arg(arg!(--cost <AMOUNT>))
                        .arg(type_arg().value_parser(["expense", "income"])),
                )
                .subcommand(item_ref(Command::new("toggle")))
                .subcommand(item_ref(Command::new("rm"))),
        )
        .subcommand(
            Command::new("payment")
                .subcommand_required(true)
                .subcommand(
                    item_ref(Command::new("add"))
                        .arg(arg!(--amount <AMOUNT>).required(true))
                        .arg(arg!(--description <TEXT>))
                        .arg(arg!(--paid "Already paid")),
                )
                .subcommand(payment_ref(Command::new("toggle")))
                .subcommand(payment_ref(Command::new("rm"))),
        )
}

fn creditor_cmd() -> Command {
    Command::new("creditor")
        .about("Money owed to others")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--amount <AMOUNT>).required(true))
                .arg(arg!(--currency <CCY>).default_value("GHS"))
                .arg(arg!(--description <TEXT>)),
        )
        .subcommand(json_flags(Command::new("list")))
        .subcommand(
            Command::new("pay")
                .about("Pay down a debt from a wallet")
                .arg(id_arg())
                .arg(arg!(--wallet <ID>).required(true))
                .arg(arg!(--amount <AMOUNT>).required(true))
                .arg(arg!(--date <DATE>)),
        )
        .subcommand(Command::new("rm").arg(id_arg()))
}

pub fn build_cli() -> Command {
    command!()
        .name("fintrack")
        .about("Personal finance tracker: wallets, budgets, projects and multi-currency totals")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More log output (-v info, -vv debug)"),
        )
        .subcommand(Command::new("init").about("Create the database and default data"))
        .subcommand(wallet_cmd())
        .subcommand(category_cmd())
        .subcommand(tx_cmd())
        .subcommand(budget_cmd())
        .subcommand(recurring_cmd())
        .subcommand(fx_cmd())
        .subcommand(report_cmd())
        .subcommand(summary_cmd())
        .subcommand(project_cmd())
        .subcommand(creditor_cmd())
        .subcommand(
            Command::new("export").subcommand_required(true).subcommand(
                Command::new("transactions")
                    .about("Export all transactions")
                    .arg(arg!(--format <FMT> "csv or json").default_value("csv"))
                    .arg(arg!(--out <PATH>).required(true)),
            ),
        )
        .subcommand(json_flags(
            Command::new("doctor").about("Check ledger consistency"),
        ))
}
