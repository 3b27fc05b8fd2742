//! Customer and staff message bodies.

use super::mailer::{Attachment, EmailMessage};
use crate::error::{ErrorCategory, FulfillmentError};
use crate::export::DeliveryArchive;
use crate::models::Order;

const SIGN_OFF: &str = "Best regards,\nThe Data Team";

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "None".to_string()
    } else {
        values.join(", ")
    }
}

/// Sent to the customer when add-on columns defer delivery to staff
pub fn acknowledgement(order: &Order, delivery_days: u64) -> EmailMessage {
    let text = format!(
        "Dear {name},\n\n\
         Thank you for your purchase. Your payment has been received.\n\n\
         Order Details:\n\
         - Order ID: {order_id}\n\
         - Total Records: {count}\n\
         - Total Price: {price}\n\
         - Selected Add-Ons: {add_ons}\n\n\
         Your data, including the requested add-ons, is being prepared and will be emailed \
         to you within {delivery_days} day(s).\n\n\
         If you have any questions, please contact support.\n\n{SIGN_OFF}",
        name = order.greeting_name(),
        order_id = order.order_id,
        count = order.total_count,
        price = order.price_display(),
        add_ons = order.add_ons_display(),
    );
    EmailMessage::new(
        &order.email,
        "Payment Confirmation - Data Delivery in Progress",
        text,
    )
}

/// Internal notice asking staff to prepare an add-on order by hand
pub fn staff_notice(order: &Order, staff_email: &str, delivery_days: u64) -> EmailMessage {
    let filters = &order.filters;
    let text = format!(
        "A new order with add-ons needs manual preparation.\n\n\
         Order Details:\n\
         - Order ID: {order_id}\n\
         - Customer Email: {email}\n\
         - Customer Name: {name}\n\
         - Total Records: {count}\n\
         - Total Price: {price}\n\
         - Selected Add-Ons: {add_ons}\n\
         - Categories: {categories}\n\
         - Subcategories: {subcategories}\n\
         - Sub-Subcategories: {sub_subcategories}\n\
         - Delivery Days: {delivery_days}\n\n\
         Please deliver the data within {delivery_days} day(s).",
        order_id = order.order_id,
        email = order.email,
        name = order.user_name.as_deref().unwrap_or("N/A"),
        count = order.total_count,
        price = order.price_display(),
        add_ons = order.add_ons_display(),
        categories = join_or_none(&filters.categories),
        subcategories = join_or_none(&filters.subcategories),
        sub_subcategories = join_or_none(&filters.sub_subcategories),
    );
    EmailMessage::new(staff_email, "New Order with Add-Ons - Action Required", text)
}

/// One part of a delivery, with the archive attached
pub fn delivery_part(order: &Order, archive: &DeliveryArchive, record_count: u64) -> EmailMessage {
    let (part, total) = (archive.part, archive.total_parts);
    let text = format!(
        "Dear {name},\n\n\
         Thank you for your purchase. Your data has been split into {total} part(s) to stay \
         within email size limits. This email contains Part {part} of {total}.\n\n\
         To recombine the parts:\n\
         1. Download all {total} part(s).\n\
         2. Decompress each attached .gz file to get its CSV file.\n\
         3. Concatenate the CSV files in part order, dropping the header row from Part 2 onward.\n\n\
         Total Records: {record_count}\n\
         Total Price: {price}\n\
         Selected Add-Ons: {add_ons}\n\n\
         If you have any questions, please contact support.\n\n{SIGN_OFF}",
        name = order.greeting_name(),
        price = order.price_display(),
        add_ons = order.add_ons_display(),
    );
    EmailMessage::new(
        &order.email,
        format!("Your Purchased Data - Part {part} of {total}"),
        text,
    )
    .with_attachment(Attachment {
        filename: archive.file_name.clone(),
        path: archive.path.clone(),
    })
}

/// Failure notice; wording depends on what went wrong and whether the refund went through
pub fn failure_notice(order: &Order, error: &FulfillmentError, refunded: bool) -> EmailMessage {
    let reason = match (error, error.category()) {
        (FulfillmentError::CountMismatch {
            expected, actual, ..
        }, _) => format!(
            "the number of records currently matching your selection ({actual}) no longer \
             matches the number you purchased ({expected})"
        ),
        (_, ErrorCategory::Delivery) => {
            "we were unable to deliver every part of your data by email".to_string()
        }
        _ => format!("of the following problem: {error}"),
    };

    let (subject, refund_line) = if refunded {
        (
            "Order Failed - Refund Initiated",
            "A refund has been initiated and the amount will be credited back to your account \
             shortly. If you have any questions, please contact support.",
        )
    } else {
        (
            "Order Failed - Refund Pending",
            "We were unable to issue your refund automatically. Our support team has been \
             notified and will process it by hand; please contact support if you do not see \
             the credit within a few business days.",
        )
    };

    let text = format!(
        "Dear {name},\n\n\
         We regret to inform you that your order (ID: {order_id}) has failed because {reason}.\n\n\
         Total Records: {count}\n\
         Total Price: {price}\n\
         Selected Add-Ons: {add_ons}\n\n\
         {refund_line}\n\n{SIGN_OFF}",
        name = order.greeting_name(),
        order_id = order.order_id,
        count = order.total_count,
        price = order.price_display(),
        add_ons = order.add_ons_display(),
    );
    EmailMessage::new(&order.email, subject, text)
}
