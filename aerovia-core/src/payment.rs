use serde::Deserialize;

use crate::{CoreError, CoreResult};

/// Card details as submitted at checkout. Shape-validated only; the
/// system never charges a card.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub numero: String,
    pub cvv: String,
    #[serde(default)]
    pub titular: Option<String>,
    #[serde(default)]
    pub expiracion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub nit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentForm {
    #[serde(default)]
    pub tarjeta: Option<CardDetails>,
    #[serde(default)]
    pub facturacion: Option<BillingDetails>,
}

/// Card number length >= 12, CVV length >= 3, billing section present.
/// Detected before any mutation.
pub fn validate_payment_shape(form: &PaymentForm) -> CoreResult<()> {
    let (tarjeta, _facturacion) = match (&form.tarjeta, &form.facturacion) {
        (Some(t), Some(f)) => (t, f),
        _ => {
            return Err(CoreError::Validation(
                "Datos de pago incompletos.".to_string(),
            ))
        }
    };

    if tarjeta.numero.trim().len() < 12 {
        return Err(CoreError::Validation(
            "Número de tarjeta inválido.".to_string(),
        ));
    }
    if tarjeta.cvv.trim().len() < 3 {
        return Err(CoreError::Validation("CVV inválido.".to_string()));
    }

    Ok(())
}
