// Copyright (c) 2022-2023 Yuki Kishimoto
// Distributed under the MIT software license

use std::collections::HashMap;

use bitcoin::{EcdsaSig, PublicKey, Script, Witness};

use crate::descriptor::{self, DerivedScripts};
use crate::psbt::Input;

/// Build the final scriptSig and witness, then drop the data a finalized input doesn't need.
///
/// `sigs` must hold at least threshold valid signatures of the derived script keys.
pub(crate) fn finalize_input(
    input: &mut Input,
    derived: &DerivedScripts,
    sigs: &[(PublicKey, EcdsaSig)],
) -> Result<(), descriptor::Error> {
    let sigs: HashMap<PublicKey, EcdsaSig> = sigs.iter().copied().collect();
    let (witness, script_sig): (Vec<Vec<u8>>, Script) = derived.satisfy(&sigs)?;

    input.final_script_sig = if script_sig.is_empty() {
        None
    } else {
        Some(script_sig)
    };
    input.final_script_witness = if witness.is_empty() {
        None
    } else {
        Some(Witness::from_vec(witness))
    };

    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();

    Ok(())
}
