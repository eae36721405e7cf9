// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

pub mod catalog;
pub mod config;
pub mod feed;
pub mod models;
pub mod openvas;
pub mod storage;
