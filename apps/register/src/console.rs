//! # Register Console
//!
//! A line-oriented register session. Each input line is one operator action.
//!
//! ```text
//! > 6291041500213            scan or type a barcode or item id or mask code
//! > qty 1 3                  set line 1 to quantity 3
//! > void 2                   void line 2
//! > return T01-20261016-0004 seed a return from a receipt
//! > pay cash 50              cash, 50 tendered (confirmation follows)
//! > pay card                 card, exact total
//! > cancel                   void the whole transaction
//! > show                     print the basket
//! > quit
//! ```
//!
//! Errors are printed as alerts; the session keeps running.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use d365pos_core::amount::{format_amount, parse_amount};
use d365pos_core::PaymentMethod;
use d365pos_db::JournalStore;

use crate::commands::{self, BasketResponse};
use crate::error::ApiError;
use crate::finalizer::SaleFinalizer;
use crate::state::SessionState;

const HELP: &str = "commands: <code> | qty <line> <quantity> | void <line> | return <receipt> \
                    | pay cash [amount] | pay card | cancel | show | help | quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Scan(String),
    Quantity { line_num: u32, quantity: Decimal },
    Void(u32),
    Return(String),
    Pay {
        method: PaymentMethod,
        tendered: Option<String>,
    },
    Cancel,
    Show,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses a console line. `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match (first.to_lowercase().as_str(), rest.as_slice()) {
            ("qty", [line, quantity]) => ConsoleCommand::Quantity {
                line_num: parse_line_num(line)?,
                quantity: parse_amount("quantity", quantity).map_err(|e| e.to_string())?,
            },
            ("qty", _) => return Err("usage: qty <line> <quantity>".into()),
            ("void", [line]) => ConsoleCommand::Void(parse_line_num(line)?),
            ("void", _) => return Err("usage: void <line>".into()),
            ("return", [receipt]) => ConsoleCommand::Return(receipt.to_string()),
            ("return", _) => return Err("usage: return <receipt id>".into()),
            ("pay", [method, tendered @ ..]) if tendered.len() <= 1 => {
                let method: PaymentMethod = method.parse()?;
                ConsoleCommand::Pay {
                    method,
                    tendered: tendered.first().map(|t| t.to_string()),
                }
            }
            ("pay", _) => return Err("usage: pay cash [amount] | pay card".into()),
            ("cancel", []) => ConsoleCommand::Cancel,
            ("show", []) => ConsoleCommand::Show,
            ("help", []) | ("?", []) => ConsoleCommand::Help,
            ("quit", []) | ("exit", []) => ConsoleCommand::Quit,
            (_, []) => ConsoleCommand::Scan(first.to_string()),
            _ => return Err(format!("unknown command '{}'; type help", line.trim())),
        };
        Ok(Some(command))
    }
}

fn parse_line_num(text: &str) -> Result<u32, String> {
    text.parse()
        .map_err(|_| format!("'{}' is not a line number", text))
}

/// Everything a console session needs.
pub struct Console {
    session: Arc<SessionState>,
    finalizer: SaleFinalizer,
    journal: Arc<dyn JournalStore>,
}

impl Console {
    pub fn new(
        session: Arc<SessionState>,
        finalizer: SaleFinalizer,
        journal: Arc<dyn JournalStore>,
    ) -> Self {
        Console {
            session,
            finalizer,
            journal,
        }
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output.write_all(format!("{}\n> ", HELP).as_bytes()).await?;
        output.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let reply = match ConsoleCommand::parse(&line) {
                Ok(None) => String::new(),
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(ConsoleCommand::Pay { method, tendered })) => {
                    self.pay(method, tendered.as_deref(), &mut lines, &mut output)
                        .await?
                }
                Ok(Some(command)) => self.execute(command).await,
                Err(usage) => format!("! {}\n", usage),
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"> ").await?;
            output.flush().await?;
        }

        info!("Register console closed");
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> String {
        let result = match command {
            ConsoleCommand::Scan(code) => commands::scan_code(&self.session, &code)
                .map(|r| describe_basket(&r.basket, Some(r.line_num))),
            ConsoleCommand::Quantity { line_num, quantity } => {
                commands::set_quantity(&self.session, line_num, quantity)
                    .map(|b| describe_basket(&b, Some(line_num)))
            }
            ConsoleCommand::Void(line_num) => {
                commands::void_line(&self.finalizer, &self.session, line_num)
                    .await
                    .map(|b| describe_basket(&b, None))
            }
            ConsoleCommand::Return(receipt_id) => {
                commands::seed_return(&self.session, self.journal.as_ref(), &receipt_id)
                    .await
                    .map(|r| {
                        format!(
                            "return from {}: {} line(s) seeded, {} skipped\n{}",
                            r.original_receipt_id,
                            r.seeded,
                            r.skipped,
                            describe_basket(&r.basket, None)
                        )
                    })
            }
            ConsoleCommand::Cancel => commands::cancel_transaction(&self.finalizer, &self.session)
                .await
                .map(|receipt_id| format!("transaction voided ({})\n", receipt_id)),
            ConsoleCommand::Show => Ok(describe_basket(&commands::get_basket(&self.session), None)),
            ConsoleCommand::Help => Ok(format!("{}\n", HELP)),
            ConsoleCommand::Pay { .. } | ConsoleCommand::Quit => Ok(String::new()),
        };
        result.unwrap_or_else(|e| alert(&e))
    }

    async fn pay<R, W>(
        &self,
        method: PaymentMethod,
        tendered: Option<&str>,
        lines: &mut tokio::io::Lines<R>,
        output: &mut W,
    ) -> std::io::Result<String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let prompt = match commands::confirm_payment(&self.finalizer, &self.session, method, tendered)
        {
            Ok(prompt) => prompt,
            Err(e) => return Ok(alert(&e)),
        };

        output
            .write_all(format!("{}\nconfirm? [y/n] ", prompt.summary()).as_bytes())
            .await?;
        output.flush().await?;

        let confirmed = match lines.next_line().await? {
            Some(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            None => false,
        };

        Ok(
            match commands::commit_payment(&self.finalizer, &self.session, &prompt, confirmed).await
            {
                Ok(Some(sale)) => format!(
                    "{} {} recorded, total {}, change {}\n",
                    sale.transaction_type,
                    sale.receipt_id,
                    format_amount(sale.total),
                    format_amount(sale.change)
                ),
                Ok(None) => "payment cancelled, basket kept\n".to_string(),
                Err(e) => alert(&e),
            },
        )
    }
}

fn alert(error: &ApiError) -> String {
    format!("! {}\n", error.message)
}

/// Basket listing; `highlight` marks the line just touched.
pub fn describe_basket(basket: &BasketResponse, highlight: Option<u32>) -> String {
    let mut out = String::new();
    for line in &basket.lines {
        let marker = if Some(line.line_num) == highlight { '*' } else { ' ' };
        let status = if line.is_void { " VOID" } else { "" };
        out.push_str(&format!(
            "{}{:>3} {:<24} {:>8} x {:>9} = {:>10}{}\n",
            marker,
            line.line_num,
            line.description,
            format_amount(line.quantity),
            format_amount(line.unit_price),
            format_amount(line.amounts().gross),
            status
        ));
    }
    out.push_str(&format!(
        "     {} line(s)  net {}  tax {}  total {}\n",
        basket.totals.active_lines,
        format_amount(basket.totals.net),
        format_amount(basket.totals.tax),
        format_amount(basket.totals.gross)
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::MockReceiptSink;
    use crate::testing::{d, sample_catalog, sample_config};
    use d365pos_db::MockJournalStore;
    use d365pos_sync::MockSalesRecordingClient;

    #[test]
    fn test_parse() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
        assert_eq!(
            ConsoleCommand::parse("6291041500213").unwrap(),
            Some(ConsoleCommand::Scan("6291041500213".into()))
        );
        assert_eq!(
            ConsoleCommand::parse("qty 2 1.5").unwrap(),
            Some(ConsoleCommand::Quantity {
                line_num: 2,
                quantity: d("1.5")
            })
        );
        assert_eq!(
            ConsoleCommand::parse("PAY cash 50").unwrap(),
            Some(ConsoleCommand::Pay {
                method: PaymentMethod::Cash,
                tendered: Some("50".into())
            })
        );
        assert_eq!(
            ConsoleCommand::parse("pay card").unwrap(),
            Some(ConsoleCommand::Pay {
                method: PaymentMethod::Card,
                tendered: None
            })
        );
        assert!(ConsoleCommand::parse("qty x 1").is_err());
        assert!(ConsoleCommand::parse("pay cheque").is_err());
        assert!(ConsoleCommand::parse("void").is_err());
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let mut sales = MockSalesRecordingClient::new();
        sales.expect_record_sales().times(1).returning(|_| Ok(()));
        let mut journal = MockJournalStore::new();
        journal.expect_next_receipt_sequence().returning(|_, _| Ok(3));
        journal.expect_record().times(1).returning(|_| Ok(()));
        let mut sink = MockReceiptSink::new();
        sink.expect_emit().times(1).returning(|_| Ok(()));

        let journal: Arc<dyn JournalStore> = Arc::new(journal);
        let finalizer =
            SaleFinalizer::new(Arc::new(sales), journal.clone(), Arc::new(sink), &sample_config());
        let session = Arc::new(SessionState::new(sample_catalog()));
        let console = Console::new(session.clone(), finalizer, journal);

        let script = b"MILK1L\nqty 1 2\nUNKNOWN\npay cash 10\npay cash 30\nn\npay cash 30\ny\nquit\n";
        let mut output = Vec::new();
        console.run(&script[..], &mut output).await.unwrap();
        let text = String::from_utf8(output).unwrap();

        assert!(text.contains("total 21.000"));
        assert!(text.contains("! No product found for code 'UNKNOWN'"));
        assert!(text.contains("! Tendered 10.000 is less than amount due 21.000"));
        assert!(text.contains("payment cancelled, basket kept"));
        assert!(text.contains("Sale T01-"));
        assert!(text.contains("change 9.000"));
        assert!(session.with_basket(|b| b.lines().is_empty()));
    }
}
