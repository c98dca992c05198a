// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod wallets;
pub mod categories;
pub mod transactions;
pub mod budgets;
pub mod recurring;
pub mod reports;
pub mod summaries;
pub mod projects;
pub mod creditors;
pub mod exporter;
pub mod fx;
pub mod doctor;
