//! Contract Definitions
//!
//! Solidity interfaces for the ETH:BEAN Uniswap V2 pair and the Beanstalk
//! diamond, defined using alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` to generate
//! contract instance types that can make RPC calls via any alloy Provider.
//!
//! Created: 2026-10-18

use alloy::sol;
use alloy::sol_types::SolCall;

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        event Mint(address indexed sender, uint256 amount0, uint256 amount1);
        event Burn(address indexed sender, uint256 amount0, uint256 amount1, address indexed to);
        event Swap(address indexed sender, uint256 amount0In, uint256 amount1In, uint256 amount0Out, uint256 amount1Out, address indexed to);

        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

// ── Beanstalk ────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IBeanstalk {
        // Silo
        event BeanDeposit(address indexed account, uint256 season, uint256 beans);
        event BeanRemove(address indexed account, uint32[] crates, uint256[] crateBeans, uint256 beans);
        event BeanWithdraw(address indexed account, uint256 season, uint256 beans);
        event BeanClaim(address indexed account, uint32[] withdrawals, uint256 beans);
        event LPDeposit(address indexed account, uint256 season, uint256 lp, uint256 seeds);
        event LPRemove(address indexed account, uint32[] crates, uint256[] crateLP, uint256 lp);
        event LPWithdraw(address indexed account, uint256 season, uint256 lp);
        event LPClaim(address indexed account, uint32[] withdrawals, uint256 lp);
        // Field
        event Sow(address indexed account, uint256 index, uint256 beans, uint256 pods);

        function depositBeans(uint256 amount) external;
        function buyAndDepositBeans(uint256 amount, uint256 buyAmount) external payable;
        function convertDepositedBeans(uint256 beans, uint256 minLP, uint32[] calldata crates, uint256[] calldata amounts) external;
        function convertDepositedLP(uint256 lp, uint256 minBeans, uint32[] calldata crates, uint256[] calldata amounts) external;
    }
}

/// Methods that convert one silo deposit into another
pub const SILO_CONVERSION_SELECTORS: &[[u8; 4]] = &[
    IBeanstalk::convertDepositedBeansCall::SELECTOR,
    IBeanstalk::convertDepositedLPCall::SELECTOR,
];

/// Methods whose user-facing action is a Bean deposit
pub const BEAN_DEPOSIT_SELECTORS: &[[u8; 4]] = &[
    IBeanstalk::depositBeansCall::SELECTOR,
    IBeanstalk::buyAndDepositBeansCall::SELECTOR,
];
