// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use firma_core::bitcoin::{Address, Network, TxOut};
use firma_core::hashes::hex::ToHex;
use firma_core::report::SigningReport;
use firma_core::{PartiallySignedTransaction, Psbt};
use num_format::{Locale, ToFormattedString};
use prettytable::format::FormatBuilder;
use prettytable::{row, Table};

pub trait Print {
    fn print(&self);
}

impl Print for SigningReport {
    fn print(&self) {
        let mut table = Table::new();

        table.set_titles(row!["Input", "Status", "Finalized"]);
        for input in self.inputs.iter() {
            table.add_row(row![input.index, input.status, input.finalized]);
        }

        table.printstd();

        println!(
            "Signed: {}, already signed: {}, skipped: {}",
            self.signed, self.already_signed, self.skipped
        );
        if let Some(fee) = self.fee {
            println!("Fee: {} sat", fee.to_formatted_string(&Locale::en));
        }
        if !self.modified {
            println!("PSBT unchanged");
        }
    }
}

fn output_table_row(network: Network, output: &TxOut) -> String {
    let mut table = Table::new();
    let format = FormatBuilder::new()
        .column_separator('|')
        .padding(0, 0)
        .build();
    table.set_format(format);
    let destination: String = match Address::from_script(&output.script_pubkey, network) {
        Ok(address) => address.to_string(),
        Err(_) => output.script_pubkey.as_bytes().to_hex(),
    };
    table.add_row(row![
        format!("{destination} "),
        format!(" {} sat", output.value.to_formatted_string(&Locale::en))
    ]);
    table.to_string()
}

pub fn print_psbt(psbt: &PartiallySignedTransaction, network: Network) {
    let tx = &psbt.unsigned_tx;
    let inputs_len: usize = tx.input.len();
    let outputs_len: usize = tx.output.len();

    let mut table = Table::new();

    table.set_titles(row![
        format!("Inputs ({inputs_len})"),
        format!("Outputs ({outputs_len})")
    ]);

    if inputs_len >= outputs_len {
        for (index, input) in tx.input.iter().enumerate() {
            let input = format!("{}", input.previous_output);
            if let Some(output) = tx.output.get(index) {
                table.add_row(row![input, output_table_row(network, output)]);
            } else {
                table.add_row(row![input, ""]);
            }
        }
    } else {
        for (index, output) in tx.output.iter().enumerate() {
            let output = output_table_row(network, output);
            if let Some(input) = tx.input.get(index) {
                table.add_row(row![format!("{}", input.previous_output), output]);
            } else {
                table.add_row(row!["", output]);
            }
        }
    }

    table.printstd();

    match psbt.fee() {
        Ok(fee) => {
            let vsize: usize = tx.vsize();
            println!(
                "Fee: {} sat (~{:.1} sat/vB unsigned)",
                fee.to_formatted_string(&Locale::en),
                fee as f64 / vsize as f64
            );
        }
        Err(e) => println!("Fee: unknown ({e})"),
    }
    println!("Finalized: {}", psbt.is_finalized());
}
